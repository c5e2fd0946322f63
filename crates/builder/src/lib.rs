#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]
//! Formula evaluation for kiln
//!
//! This crate loads and validates formula descriptors, resolves build
//! options, selects and locates dependencies, acquires and patches the
//! source, renders the invocation plan and runs it.

mod build_systems;
mod core;
pub mod dependencies;
mod execute;
pub mod formula;
mod options;
pub mod patches;
mod placeholders;
mod plan;
mod requirements;
pub mod source;
mod workdir;

pub use build_systems::{
    AutotoolsBuildSystem, BuildSystem, BuildSystemConfig, BuildSystemRegistry, CMakeBuildSystem,
    MesonBuildSystem,
};
pub use crate::core::context::EvaluationContext;
pub use crate::core::evaluator::{Evaluator, InstallRequest, StageFailure};
pub use dependencies::{
    locate_dependencies, select_dependencies, CellarRegistry, InstalledKeg, InstalledRegistry,
    StaticRegistry,
};
pub use execute::{execute, execute_phase, run_tests, ExecutionSettings, ExecutionSummary};
pub use formula::{find_formula, load_formula, parse_formula, validate_formula};
pub use options::{resolve_options, resolve_request};
pub use patches::{apply_patches, STAMP_FILE};
pub use placeholders::Placeholders;
pub use plan::{build_invocation_plan, PlanLayout};
pub use requirements::check_requirements;
pub use source::{acquire_source, AcquiredSource, FetchedPatches, Fetcher, SourceOrigin};
pub use workdir::WorkDir;
