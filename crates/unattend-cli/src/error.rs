//! CLI error type and exit codes.

use thiserror::Error;
use unattend_core::{InstallError, PathError, SettingsError};

#[derive(Debug, Error)]
pub enum CliError {
    /// Manifest could not be read or parsed.
    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The install engine rejected a request.
    #[error("{0}")]
    Install(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl CliError {
    /// Map error to an exit code (sysexits.h where one fits).
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Manifest(_) => 65, // EX_DATAERR
            Self::Config(_) => 78,   // EX_CONFIG
            Self::Install(_) => 1,
            Self::Io(_) => 74, // EX_IOERR
        }
    }
}

impl From<InstallError> for CliError {
    fn from(err: InstallError) -> Self {
        Self::Install(err.user_message())
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
