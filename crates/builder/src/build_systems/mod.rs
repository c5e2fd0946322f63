//! Configure systems and their standard arguments
//!
//! A formula's configure step may ask for `std_args`; the arguments come
//! from the build system matching the configure program.

use std::path::Path;

mod autotools;
mod cmake;
mod meson;

pub use autotools::AutotoolsBuildSystem;
pub use cmake::CMakeBuildSystem;
pub use meson::MesonBuildSystem;

/// Static description of a build system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSystemConfig {
    /// Arguments prepended to the configure invocation, may use placeholders
    pub default_configure_args: Vec<String>,
}

/// Trait for build system implementations
pub trait BuildSystem: Send + Sync {
    /// Get build system name
    fn name(&self) -> &'static str;

    /// Program basenames handled by this build system
    fn programs(&self) -> &'static [&'static str];

    /// Get configuration options specific to this build system
    fn get_config_options(&self) -> BuildSystemConfig;

    /// Standard configure arguments
    fn std_args(&self) -> Vec<String> {
        self.get_config_options().default_configure_args
    }
}

/// Registry of available build systems
pub struct BuildSystemRegistry {
    systems: Vec<Box<dyn BuildSystem>>,
}

impl BuildSystemRegistry {
    /// Create a new registry with all supported build systems
    #[must_use]
    pub fn new() -> Self {
        Self {
            systems: vec![
                Box::new(CMakeBuildSystem::new()),
                Box::new(AutotoolsBuildSystem::new()),
                Box::new(MesonBuildSystem::new()),
            ],
        }
    }

    /// Build system for a configure program, matched on its basename
    #[must_use]
    pub fn for_program(&self, program: &str) -> Option<&dyn BuildSystem> {
        let base = Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(program);
        self.systems
            .iter()
            .find(|s| s.programs().contains(&base))
            .map(AsRef::as_ref)
    }
}

impl Default for BuildSystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build tools that accept `-j<N>`
pub const PARALLEL_TOOLS: &[&str] = &["make", "gmake"];
