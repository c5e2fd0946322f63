//! Platform-specific operation events

use serde::{Deserialize, Serialize};

/// Process-level events emitted by `kiln-platform`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// Process execution started
    ProcessExecutionStarted {
        /// Command being executed
        command: String,
        /// Command arguments
        args: Vec<String>,
        /// Working directory (if set)
        working_dir: Option<String>,
    },

    /// Process execution completed
    ProcessExecutionCompleted {
        /// Command that was executed
        command: String,
        /// Exit code from the process, absent when killed by a signal
        exit_code: Option<i32>,
        /// Duration of execution in milliseconds
        duration_ms: u64,
        /// Size of stdout in bytes
        stdout_bytes: usize,
        /// Size of stderr in bytes
        stderr_bytes: usize,
    },

    /// Process could not be run to completion
    ProcessExecutionFailed {
        /// Command that failed
        command: String,
        /// Error message
        error_message: String,
        /// Duration before failure in milliseconds
        duration_ms: u64,
    },

    /// Host detection finished
    HostDetected {
        family: String,
        version: String,
        arch: String,
    },
}
