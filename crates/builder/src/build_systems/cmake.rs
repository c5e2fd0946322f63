//! CMake build system implementation

use super::{BuildSystem, BuildSystemConfig};

/// CMake build system
pub struct CMakeBuildSystem {
    config: BuildSystemConfig,
}

impl CMakeBuildSystem {
    /// Create a new CMake build system instance
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: BuildSystemConfig {
                default_configure_args: vec![
                    "-DCMAKE_INSTALL_PREFIX=${PREFIX}".to_string(),
                    "-DCMAKE_BUILD_TYPE=Release".to_string(),
                    "-DCMAKE_FIND_FRAMEWORK=LAST".to_string(),
                    "-DCMAKE_VERBOSE_MAKEFILE=ON".to_string(),
                    "-Wno-dev".to_string(),
                ],
            },
        }
    }
}

impl Default for CMakeBuildSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildSystem for CMakeBuildSystem {
    fn name(&self) -> &'static str {
        "cmake"
    }

    fn programs(&self) -> &'static [&'static str] {
        &["cmake"]
    }

    fn get_config_options(&self) -> BuildSystemConfig {
        self.config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_args_order() {
        let args = CMakeBuildSystem::new().std_args();
        assert_eq!(args[0], "-DCMAKE_INSTALL_PREFIX=${PREFIX}");
        assert_eq!(args.last().map(String::as_str), Some("-Wno-dev"));
        assert_eq!(args.len(), 5);
    }
}
