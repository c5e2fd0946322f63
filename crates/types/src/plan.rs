//! Invocation plans

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::options::{BuildMode, ResolvedOptions};

/// Phase an invocation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanPhase {
    Configure,
    Build,
    Install,
    Test,
}

impl std::fmt::Display for PlanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configure => write!(f, "configure"),
            Self::Build => write!(f, "build"),
            Self::Install => write!(f, "install"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// One external command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub phase: PlanPhase,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl Invocation {
    /// Shell-like rendering for logs and error messages
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('\'');
                line.push_str(arg);
                line.push('\'');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// The full ordered command list for one run, with its environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationPlan {
    pub formula: String,
    pub version: String,
    pub mode: BuildMode,
    pub options: ResolvedOptions,
    pub prefix: PathBuf,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub env: BTreeMap<String, String>,
    pub invocations: Vec<Invocation>,
}

impl InvocationPlan {
    /// Invocations of one phase, in order
    pub fn phase(&self, phase: PlanPhase) -> impl Iterator<Item = &Invocation> {
        self.invocations.iter().filter(move |i| i.phase == phase)
    }

    /// The configure invocation's arguments
    #[must_use]
    pub fn configure_args(&self) -> &[String] {
        self.phase(PlanPhase::Configure)
            .next()
            .map(|i| i.args.as_slice())
            .unwrap_or_default()
    }

    /// Configure, build, install and test appear in that order
    #[must_use]
    pub fn is_well_ordered(&self) -> bool {
        self.invocations
            .windows(2)
            .all(|pair| pair[0].phase <= pair[1].phase)
    }
}
