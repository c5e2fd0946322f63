//! Report types for install runs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dependency::LocatedDependency;
use crate::options::{BuildMode, ResolvedOptions};

/// Result of the post-install test phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    /// No test step applied under the resolved options
    NotRun,
    Passed {
        commands: usize,
    },
    /// Only reachable with the `warn` failure policy
    Failed {
        command: String,
        exit_code: Option<i32>,
    },
}

impl TestOutcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Summary of a completed install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub formula: String,
    pub version: String,
    pub mode: BuildMode,
    pub prefix: PathBuf,
    pub options: ResolvedOptions,
    pub dependencies: Vec<LocatedDependency>,
    pub patches_applied: Vec<String>,
    pub commands_run: usize,
    pub tests: TestOutcome,
    pub duration_ms: u64,
    /// Present when the work directory was kept for inspection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
}
