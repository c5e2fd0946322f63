//! Build error types
//!
//! Every failure of an external command in the invocation plan ends up here,
//! together with the source acquisition failures that precede patching.

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum BuildError {
    #[error("{phase} command `{command}` exited with {}{}", exit_label(.exit_code), output_suffix(.output))]
    CommandFailed {
        phase: String,
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("failed to spawn `{command}`: {message}")]
    SpawnFailed { command: String, message: String },

    #[error("`{command}` timed out after {seconds} seconds")]
    Timeout { command: String, seconds: u64 },

    #[error("fetch failed: {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("extraction failed: {message}")]
    ExtractionFailed { message: String },

    #[error("unsupported archive format: {path}")]
    UnsupportedArchive { path: String },
}

#[allow(clippy::ref_option)]
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
}

fn output_suffix(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!("\n{output}")
    }
}

impl BuildError {
    /// Exit code of the failing command, if it ran to completion
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

impl UserFacingError for BuildError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::CommandFailed { .. } => {
                Some("Inspect the command output above; rerun with --keep-work-dir to debug.")
            }
            Self::SpawnFailed { .. } => Some("Make sure the build tool is installed and on PATH."),
            Self::Timeout { .. } => Some("Increase build.timeout_seconds or set it to 0."),
            Self::FetchFailed { .. } => {
                Some("Check network access or stage the sources with --source-dir.")
            }
            Self::ChecksumMismatch { .. } => {
                Some("The download differs from the formula; update the checksum if intended.")
            }
            Self::ExtractionFailed { .. } | Self::UnsupportedArchive { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::CommandFailed { .. } => "build.command_failed",
            Self::SpawnFailed { .. } => "build.spawn_failed",
            Self::Timeout { .. } => "build.timeout",
            Self::FetchFailed { .. } => "build.fetch_failed",
            Self::ChecksumMismatch { .. } => "build.checksum_mismatch",
            Self::ExtractionFailed { .. } => "build.extraction_failed",
            Self::UnsupportedArchive { .. } => "build.unsupported_archive",
        };
        Some(code)
    }
}
