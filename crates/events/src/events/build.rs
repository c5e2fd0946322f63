use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use kiln_types::{BuildMode, DependencyPhase, PlanPhase, Stage};

use super::FailureContext;

/// Formula evaluation events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BuildEvent {
    /// A run started
    SessionStarted {
        formula: String,
        version: String,
        mode: BuildMode,
    },

    /// A stage is being entered
    StageStarted { formula: String, stage: Stage },

    /// A stage finished successfully
    StageCompleted {
        formula: String,
        stage: Stage,
        duration_ms: u64,
    },

    /// A stage failed; the run is over
    StageFailed {
        formula: String,
        stage: Stage,
        failure: FailureContext,
    },

    /// Options resolved against overrides
    OptionsResolved {
        formula: String,
        enabled: Vec<String>,
        disabled: Vec<String>,
    },

    /// A selected dependency was found
    DependencyLocated {
        name: String,
        phase: DependencyPhase,
        prefix: PathBuf,
    },

    /// A source archive or remote patch was downloaded and verified
    DownloadCompleted { url: String, bytes: u64 },

    /// Source archive or checkout is in place
    SourceReady { formula: String, source_dir: PathBuf },

    /// One patch applied to the in-memory tree
    PatchApplied { formula: String, patch: String },

    /// External command about to run
    CommandStarted {
        phase: PlanPhase,
        command: String,
        working_dir: PathBuf,
    },

    /// External command exited successfully
    CommandCompleted {
        phase: PlanPhase,
        command: String,
        duration_ms: u64,
    },

    /// Test phase failed but the failure policy kept the install
    TestsFailed {
        formula: String,
        command: String,
        exit_code: Option<i32>,
    },

    /// The run finished
    SessionCompleted {
        formula: String,
        version: String,
        prefix: PathBuf,
        duration_ms: u64,
    },
}
