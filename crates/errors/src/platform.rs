//! Platform-specific operation errors

use std::borrow::Cow;

use crate::{BuildError, UserFacingError};
use thiserror::Error;

/// Errors that can occur during platform-specific operations
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlatformError {
    #[error("process execution failed: {command} - {message}")]
    ProcessExecutionFailed { command: String, message: String },

    #[error("process timed out: {command} after {seconds}s")]
    ProcessTimedOut { command: String, seconds: u64 },

    #[error("command not found: {command}")]
    CommandNotFound { command: String },

    #[error("host detection failed: {message}")]
    HostDetectionFailed { message: String },
}

impl UserFacingError for PlatformError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::CommandNotFound { .. } => Some("Install the tool or add it to PATH."),
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ProcessExecutionFailed { .. } => "platform.process_execution_failed",
            Self::ProcessTimedOut { .. } => "platform.process_timed_out",
            Self::CommandNotFound { .. } => "platform.command_not_found",
            Self::HostDetectionFailed { .. } => "platform.host_detection_failed",
        };
        Some(code)
    }
}

impl From<PlatformError> for BuildError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::ProcessTimedOut { command, seconds } => {
                BuildError::Timeout { command, seconds }
            }
            PlatformError::ProcessExecutionFailed { command, message } => {
                BuildError::SpawnFailed { command, message }
            }
            PlatformError::CommandNotFound { command } => BuildError::SpawnFailed {
                message: "command not found".to_string(),
                command,
            },
            PlatformError::HostDetectionFailed { message } => BuildError::SpawnFailed {
                command: "host detection".to_string(),
                message,
            },
        }
    }
}
