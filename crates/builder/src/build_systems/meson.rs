//! Meson build system implementation

use super::{BuildSystem, BuildSystemConfig};

/// Meson build system
pub struct MesonBuildSystem {
    config: BuildSystemConfig,
}

impl MesonBuildSystem {
    /// Create a new Meson build system instance
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: BuildSystemConfig {
                default_configure_args: vec![
                    "setup".to_string(),
                    "--prefix=${PREFIX}".to_string(),
                    "--libdir=${PREFIX}/lib".to_string(),
                    "--buildtype=release".to_string(),
                    "--wrap-mode=nofallback".to_string(),
                ],
            },
        }
    }
}

impl Default for MesonBuildSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildSystem for MesonBuildSystem {
    fn name(&self) -> &'static str {
        "meson"
    }

    fn programs(&self) -> &'static [&'static str] {
        &["meson"]
    }

    fn get_config_options(&self) -> BuildSystemConfig {
        self.config.clone()
    }
}
