//! Installer launcher port.
//!
//! Intent-based: callers describe what to run and how visible it may be;
//! implementations pick creation flags and elevation mechanics.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::InstallError;

/// What to launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub program: PathBuf,
    /// Arguments as they should appear on the command line, quotes included.
    /// Passed verbatim on Windows.
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Suppress the console window (`CREATE_NO_WINDOW` on Windows).
    pub hidden: bool,
    /// Start through the OS elevation prompt.
    pub elevated: bool,
}

impl LaunchRequest {
    /// Launch `program` hidden and unelevated.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            hidden: true,
            elevated: false,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub const fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    /// Program and arguments, space-joined, for logs.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// A running installer.
#[async_trait]
pub trait InstallerProcess: Send {
    /// OS process ID, `None` once reaped.
    fn pid(&self) -> Option<u32>;

    /// Wait for exit. Returns the exit code (`None` if killed by a signal).
    ///
    /// Must be cancel-safe: dropping the future leaves the process running.
    async fn wait(&mut self) -> Result<Option<i32>, InstallError>;

    /// Kill the process and all of its descendants, children first.
    async fn kill_tree(&mut self) -> Result<(), InstallError>;
}

/// Port for starting installers.
pub trait InstallerLauncher: Send + Sync {
    /// Start the process. Failure maps to [`InstallError::SpawnFailed`].
    fn launch(&self, request: &LaunchRequest) -> Result<Box<dyn InstallerProcess>, InstallError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_hidden() {
        let request = LaunchRequest::new("setup.exe").with_args(vec!["/S".to_string()]);
        assert!(request.hidden);
        assert!(!request.elevated);
        assert_eq!(request.display_command(), "setup.exe /S");
    }
}
