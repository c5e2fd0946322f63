//! CLI error handling

use std::fmt;

use kiln_builder::StageFailure;
use kiln_errors::UserFacingError;
use kiln_types::Stage;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Configuration error
    Config(kiln_errors::ConfigError),
    /// Error before any stage ran: loading the config or the formula
    Init(kiln_errors::Error),
    /// A formula stage failed
    Stage(StageFailure),
    /// I/O error
    Io(std::io::Error),
}

impl CliError {
    /// Process exit code; distinct per failing stage
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Stage(failure) => failure.exit_code(),
            CliError::Config(_) | CliError::Init(_) | CliError::Io(_) => Stage::Init.exit_code(),
        }
    }
}

fn write_user_facing(f: &mut fmt::Formatter<'_>, e: &dyn UserFacingError) -> fmt::Result {
    write!(f, "{}", e.user_message())?;
    if let Some(code) = e.user_code() {
        write!(f, "\n  Code: {code}")?;
    }
    if let Some(hint) = e.user_hint() {
        write!(f, "\n  Hint: {hint}")?;
    }
    Ok(())
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {e}"),
            CliError::Init(e) => write_user_facing(f, e),
            CliError::Stage(failure) => {
                write!(f, "{} stage failed: ", failure.stage)?;
                write_user_facing(f, &failure.error)
            }
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Init(e) => Some(e),
            CliError::Stage(e) => Some(e),
            CliError::Io(e) => Some(e),
        }
    }
}

impl From<kiln_errors::ConfigError> for CliError {
    fn from(e: kiln_errors::ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<kiln_errors::Error> for CliError {
    fn from(e: kiln_errors::Error) -> Self {
        CliError::Init(e)
    }
}

impl From<StageFailure> for CliError {
    fn from(e: StageFailure) -> Self {
        CliError::Stage(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
