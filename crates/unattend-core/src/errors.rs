//! Install error types.
//!
//! These errors are designed to be serializable and not depend on external
//! error types like `std::io::Error`. For I/O errors, we capture the kind
//! and message as strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::InstallStatus;

/// Error type for install operations.
///
/// Every per-item variant is recoverable at the orchestrator boundary: it
/// becomes a `Failed` status with `last_error` set. Only
/// `InvariantViolation` stops the orchestrator.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum InstallError {
    /// No acquisition strategy produced a payload.
    #[error("Payload not found for '{name}'")]
    PayloadNotFound {
        /// Display name of the item.
        name: String,
    },

    /// The installer process could not be started.
    #[error("Failed to start installer: {message}")]
    SpawnFailed {
        /// Detailed error message.
        message: String,
    },

    /// The installer did not exit within the configured budget.
    #[error("Installer timed out after {seconds}s")]
    Timeout {
        /// The budget that elapsed.
        seconds: u64,
    },

    /// The installer exited but the install directory does not look installed.
    #[error("Verification failed: {message}")]
    VerificationFailed {
        /// What the verification step found.
        message: String,
    },

    /// The installer exited with a code outside the success list.
    #[error("Installer exited with code {code}")]
    ExitCode {
        /// Raw exit code.
        code: i32,
    },

    /// A process could not be inspected or signalled.
    #[error("Access denied to process {pid}")]
    ProcessAccessDenied {
        /// The process that refused access.
        pid: u32,
    },

    /// Auxiliary-process cleanup did not finish.
    #[error("Cleanup failed: {message}")]
    CleanupFailed {
        /// Detailed error message.
        message: String,
    },

    /// Network/HTTP error while fetching a payload.
    #[error("Network error: {message}")]
    Network {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// I/O error during file operations.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "not found", "permission denied").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// A status change was rejected by the transition table.
    #[error("Illegal transition {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: InstallStatus,
        /// Requested status.
        to: InstallStatus,
    },

    /// Item not found in the queue.
    #[error("Not in queue: {id}")]
    NotInQueue {
        /// The item ID that wasn't found.
        id: String,
    },

    /// Orchestrator state is corrupt; this is a program defect.
    #[error("Invariant violated: {message}")]
    InvariantViolation {
        /// Diagnostic description.
        message: String,
    },

    /// Install was cancelled by user.
    #[error("Install cancelled")]
    Cancelled,

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl InstallError {
    /// Create a payload-not-found error.
    pub fn payload_not_found(name: impl Into<String>) -> Self {
        Self::PayloadNotFound { name: name.into() }
    }

    /// Create a spawn error.
    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self::SpawnFailed {
            message: message.into(),
        }
    }

    /// Create a timeout error from the elapsed budget.
    #[must_use]
    pub const fn timeout(budget: std::time::Duration) -> Self {
        Self::Timeout {
            seconds: budget.as_secs(),
        }
    }

    /// Create a verification error.
    pub fn verification_failed(message: impl Into<String>) -> Self {
        Self::VerificationFailed {
            message: message.into(),
        }
    }

    /// Create a cleanup error.
    pub fn cleanup_failed(message: impl Into<String>) -> Self {
        Self::CleanupFailed {
            message: message.into(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a network error with HTTP status code.
    pub fn network_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create an I/O error from a `std::io::Error`.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    /// Create a not in queue error.
    pub fn not_in_queue(id: impl ToString) -> Self {
        Self::NotInQueue { id: id.to_string() }
    }

    /// Create an invariant violation.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the orchestrator must stop on this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::PayloadNotFound { name } => format!(
                "No installer found for '{name}' (checked local files, bundle, network and search roots)."
            ),
            Self::SpawnFailed { message } => format!("Could not start the installer: {message}"),
            Self::Timeout { seconds } => {
                format!("The installer did not finish within {seconds} seconds and was stopped.")
            }
            Self::VerificationFailed { message } => {
                format!("The installer exited but the program does not look installed: {message}")
            }
            Self::ExitCode { code } => format!("The installer reported failure (exit code {code})."),
            Self::Network {
                message,
                status_code: Some(code),
            } => format!("Network error (HTTP {code}): {message}"),
            Self::Network { message, .. } => format!("Network error: {message}"),
            Self::Io { message, .. } => format!("File operation failed: {message}"),
            Self::Cancelled => "Install was cancelled.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for InstallError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

/// Convenience result type for install operations.
pub type InstallResult<T> = Result<T, InstallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = InstallError::from_io_error(&io_err);

        match err {
            InstallError::Io { kind, message } => {
                assert_eq!(kind, "NotFound");
                assert!(message.contains("file not found"));
            }
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_error_serialization() {
        let err = InstallError::invariant("two items installing");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("two items installing"));

        let parsed: InstallError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn test_only_invariant_violation_is_fatal() {
        assert!(InstallError::invariant("x").is_fatal());
        assert!(!InstallError::payload_not_found("x").is_fatal());
        assert!(!InstallError::timeout(std::time::Duration::from_secs(180)).is_fatal());
    }

    #[test]
    fn test_user_messages() {
        let err = InstallError::timeout(std::time::Duration::from_secs(180));
        assert!(err.user_message().contains("180"));
        assert!(
            InstallError::payload_not_found("Steam")
                .user_message()
                .contains("Steam")
        );
    }
}
