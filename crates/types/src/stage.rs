//! Evaluator stages

use serde::{Deserialize, Serialize};

/// Stages of one formula run, in order
///
/// A failure is attributed to the stage that was being entered when it
/// occurred, so `Configured` failing means the configure command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    OptionsResolved,
    DependenciesSelected,
    RequirementsChecked,
    SourceAcquired,
    PatchesApplied,
    Configured,
    Built,
    Installed,
    TestsRun,
    Done,
}

impl Stage {
    /// Process exit code reported when this stage fails
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Init => 2,
            Self::OptionsResolved => 3,
            Self::DependenciesSelected => 4,
            Self::RequirementsChecked => 5,
            Self::SourceAcquired => 6,
            Self::PatchesApplied => 7,
            Self::Configured => 8,
            Self::Built => 9,
            Self::Installed => 10,
            Self::TestsRun => 11,
            Self::Done => 1,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::OptionsResolved => "options",
            Self::DependenciesSelected => "dependencies",
            Self::RequirementsChecked => "requirements",
            Self::SourceAcquired => "source",
            Self::PatchesApplied => "patches",
            Self::Configured => "configure",
            Self::Built => "build",
            Self::Installed => "install",
            Self::TestsRun => "test",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}
