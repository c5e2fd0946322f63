//! Configuration error types
//!
//! Covers both the kiln configuration file and the user-visible configuration
//! of a single formula run: the descriptor itself, option switches and
//! dependency variant selection.

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("invalid config: {message}")]
    Invalid { message: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("formula not found: {name}")]
    FormulaNotFound { name: String },

    #[error("invalid formula {formula}: {message}")]
    InvalidFormula { formula: String, message: String },

    #[error("unknown option '{name}' for {formula}")]
    UnknownOption { formula: String, name: String },

    #[error("option '{name}' is both enabled and disabled")]
    ConflictingOverride { name: String },

    #[error("unrecognised switch: {switch}")]
    InvalidSwitch { switch: String },

    #[error("dependencies {first} and {second} are mutually exclusive variants of {group}")]
    ConflictingDependencies {
        group: String,
        first: String,
        second: String,
    },

    #[error("{formula} has no head source; --HEAD is not available")]
    HeadUnavailable { formula: String },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => Some("Provide a configuration file with --config or remove the flag."),
            Self::InvalidValue { .. } | Self::Invalid { .. } | Self::ParseError { .. } => {
                Some("Fix the configuration value and retry the command.")
            }
            Self::FormulaNotFound { .. } => {
                Some("Pass a path to a formula file or add its directory to paths.formula_dirs.")
            }
            Self::InvalidFormula { .. } => Some("Correct the formula definition before retrying."),
            Self::UnknownOption { .. } => {
                Some("Run `kiln options <formula>` to list the switches this formula accepts.")
            }
            Self::ConflictingOverride { .. } => {
                Some("Pass either --with-<option> or --without-<option>, not both.")
            }
            Self::InvalidSwitch { .. } => {
                Some("Switches take the form --with-<option>, --without-<option> or --HEAD.")
            }
            Self::ConflictingDependencies { .. } => {
                Some("Disable one of the conflicting variants with --without-<option>.")
            }
            Self::HeadUnavailable { .. } => Some("Build the released version instead."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "config.not_found",
            Self::Invalid { .. } => "config.invalid",
            Self::ParseError { .. } => "config.parse_error",
            Self::InvalidValue { .. } => "config.invalid_value",
            Self::FormulaNotFound { .. } => "config.formula_not_found",
            Self::InvalidFormula { .. } => "config.invalid_formula",
            Self::UnknownOption { .. } => "config.unknown_option",
            Self::ConflictingOverride { .. } => "config.conflicting_override",
            Self::InvalidSwitch { .. } => "config.invalid_switch",
            Self::ConflictingDependencies { .. } => "config.conflicting_dependencies",
            Self::HeadUnavailable { .. } => "config.head_unavailable",
        };
        Some(code)
    }
}
