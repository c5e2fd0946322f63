//! GNU Autotools build system implementation

use super::{BuildSystem, BuildSystemConfig};

/// Autotools (`./configure`) build system
pub struct AutotoolsBuildSystem {
    config: BuildSystemConfig,
}

impl AutotoolsBuildSystem {
    /// Create a new Autotools build system instance
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: BuildSystemConfig {
                default_configure_args: vec![
                    "--prefix=${PREFIX}".to_string(),
                    "--disable-dependency-tracking".to_string(),
                    "--disable-debug".to_string(),
                ],
            },
        }
    }
}

impl Default for AutotoolsBuildSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildSystem for AutotoolsBuildSystem {
    fn name(&self) -> &'static str {
        "autotools"
    }

    fn programs(&self) -> &'static [&'static str] {
        &["configure"]
    }

    fn get_config_options(&self) -> BuildSystemConfig {
        self.config.clone()
    }
}
