//! Host environment error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum EnvironmentError {
    #[error("{formula}: {message}")]
    PreconditionFailed { formula: String, message: String },

    #[error("unsupported platform: {message}")]
    UnsupportedPlatform { message: String },

    #[error("work directory {path} unavailable: {message}")]
    WorkDirUnavailable { path: String, message: String },

    #[error("required tool not found: {tool}")]
    ToolMissing { tool: String },
}

impl UserFacingError for EnvironmentError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PreconditionFailed { .. } => {
                Some("Check the formula's requirements; some hosts need --HEAD.")
            }
            Self::UnsupportedPlatform { .. } => None,
            Self::WorkDirUnavailable { .. } => {
                Some("Check that paths.work_root exists and is writable.")
            }
            Self::ToolMissing { .. } => Some("Install the tool or add it to PATH."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::PreconditionFailed { .. } => "environment.precondition_failed",
            Self::UnsupportedPlatform { .. } => "environment.unsupported_platform",
            Self::WorkDirUnavailable { .. } => "environment.work_dir_unavailable",
            Self::ToolMissing { .. } => "environment.tool_missing",
        };
        Some(code)
    }
}
