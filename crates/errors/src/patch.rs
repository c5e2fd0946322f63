//! Source patching error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PatchError {
    #[error("'{search}' not found in {file}")]
    NoMatch { file: String, search: String },

    #[error("hunk rejected for {file} by {patch}: {message}")]
    HunkRejected {
        file: String,
        patch: String,
        message: String,
    },

    #[error("malformed diff {patch}: {message}")]
    InvalidDiff { patch: String, message: String },

    #[error("patch target missing: {file}")]
    TargetMissing { file: String },

    #[error("patch target escapes the source tree: {path}")]
    PathEscape { path: String },

    #[error("source tree at {path} is already patched")]
    AlreadyApplied { path: String },

    #[error("remote patch {url} has not been fetched")]
    NotFetched { url: String },
}

impl UserFacingError for PatchError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NoMatch { .. } | Self::HunkRejected { .. } | Self::TargetMissing { .. } => {
                Some("Update the patch so it applies cleanly to the current sources.")
            }
            Self::InvalidDiff { .. } | Self::PathEscape { .. } => {
                Some("Correct the patch definition in the formula.")
            }
            Self::AlreadyApplied { .. } => {
                Some("Start from a fresh source tree; patches are applied exactly once.")
            }
            Self::NotFetched { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NoMatch { .. } => "patch.no_match",
            Self::HunkRejected { .. } => "patch.hunk_rejected",
            Self::InvalidDiff { .. } => "patch.invalid_diff",
            Self::TargetMissing { .. } => "patch.target_missing",
            Self::PathEscape { .. } => "patch.path_escape",
            Self::AlreadyApplied { .. } => "patch.already_applied",
            Self::NotFetched { .. } => "patch.not_fetched",
        };
        Some(code)
    }
}
