#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the kiln formula evaluator
//!
//! This crate provides the closed data model of a formula: its metadata,
//! option declarations, dependency list, predicate-tagged patches and
//! install procedure, together with the invocation plan and reports derived
//! from it. Everything here is plain data; evaluation lives in
//! `kiln-builder`.

pub mod condition;
pub mod dependency;
pub mod formula;
pub mod install;
pub mod options;
pub mod patch;
pub mod plan;
pub mod reports;
pub mod stage;

// Re-export commonly used types
pub use condition::{holds, Condition, ConditionContext, OsFamily, OsVersionMatch, PlatformInfo};
pub use dependency::{Dependency, DependencyKind, DependencyPhase, LocatedDependency};
pub use formula::{Checksum, ChecksumAlgorithm, Formula, HeadSource, Precondition};
pub use install::{CommandStep, ConfigureStep, InstallProcedure, OptionArgs};
pub use options::{
    BuildMode, BuildRequest, OptionDecl, OptionOrigin, OptionOverrides, ResolvedOptions,
};
pub use patch::{DiffPatch, DiffSource, Inreplace, Patch, PatchAction};
pub use plan::{Invocation, InvocationPlan, PlanPhase};
pub use reports::{InstallReport, TestOutcome};
pub use stage::Stage;

use serde::{Deserialize, Serialize};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    Tty,
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Tty
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    Always,
    Auto,
    Never,
}

// Implement clap::ValueEnum for ColorChoice
impl clap::ValueEnum for ColorChoice {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Always, Self::Auto, Self::Never]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Always => clap::builder::PossibleValue::new("always"),
            Self::Auto => clap::builder::PossibleValue::new("auto"),
            Self::Never => clap::builder::PossibleValue::new("never"),
        })
    }
}

impl Default for ColorChoice {
    fn default() -> Self {
        Self::Auto
    }
}

/// Policy applied when the post-install test phase fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFailurePolicy {
    /// A failing test command fails the run like any other command
    Fatal,
    /// The install stands; the failure is reported as a warning
    Warn,
}

impl Default for TestFailurePolicy {
    fn default() -> Self {
        Self::Fatal
    }
}

impl std::fmt::Display for TestFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Warn => write!(f, "warn"),
        }
    }
}
