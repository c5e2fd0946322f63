//! Dependency lookup error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum DependencyError {
    #[error("{phase} dependency {name} is not installed")]
    NotInstalled { name: String, phase: String },

    #[error("dependency {name} is referenced but not selected for this build")]
    NotSelected { name: String },
}

impl UserFacingError for DependencyError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotInstalled { .. } => {
                Some("Install the dependency first, or disable it with --without-<option>.")
            }
            Self::NotSelected { .. } => Some("Enable the option that pulls in this dependency."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotInstalled { .. } => "dependency.not_installed",
            Self::NotSelected { .. } => "dependency.not_selected",
        };
        Some(code)
    }
}
