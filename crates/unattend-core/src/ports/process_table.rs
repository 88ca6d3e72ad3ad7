//! Process table port.
//!
//! A read-mostly view of the OS process list, plus the two ways of ending a
//! process: a graceful close request and a forced kill. Enumeration must
//! tolerate processes exiting mid-scan; entries that cannot be read are
//! simply absent.

use serde::{Deserialize, Serialize};

use crate::errors::InstallError;

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub parent_pid: Option<u32>,
    /// Image name as reported by the OS (e.g. `unarc.exe`).
    pub name: String,
    /// Resident memory in bytes.
    pub memory_bytes: u64,
}

impl ProcessInfo {
    /// Convenience constructor for tests and adapters.
    pub fn new(pid: u32, parent_pid: Option<u32>, name: impl Into<String>) -> Self {
        Self {
            pid,
            parent_pid,
            name: name.into(),
            memory_bytes: 0,
        }
    }

    #[must_use]
    pub const fn with_memory(mut self, bytes: u64) -> Self {
        self.memory_bytes = bytes;
        self
    }
}

/// Port for enumerating and terminating processes.
pub trait ProcessTablePort: Send + Sync {
    /// Fresh snapshot of all readable processes.
    fn snapshot(&self) -> Vec<ProcessInfo>;

    /// Resident memory of a process, `None` if it is gone or unreadable.
    fn resident_memory(&self, pid: u32) -> Option<u64>;

    /// Ask a process to close (WM_CLOSE / SIGTERM equivalent).
    fn request_close(&self, pid: u32) -> Result<(), InstallError>;

    /// Terminate a process immediately.
    fn kill(&self, pid: u32) -> Result<(), InstallError>;

    /// Whether the process still exists.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Case-insensitive process-name match, exact or prefix, `.exe` optional.
///
/// `unarc` matches `unarc.exe`, `Unarc.EXE` and `unarc64.exe`.
pub fn process_name_matches(process_name: &str, wanted: &str) -> bool {
    let name = strip_exe(&process_name.to_lowercase()).to_string();
    let wanted = wanted.to_lowercase();
    let wanted = strip_exe(&wanted);
    !wanted.is_empty() && (name == wanted || name.starts_with(wanted))
}

fn strip_exe(name: &str) -> &str {
    name.strip_suffix(".exe").unwrap_or(name)
}

/// First process whose name matches any of `wanted`.
pub fn find_process<'a>(snapshot: &'a [ProcessInfo], wanted: &[String]) -> Option<&'a ProcessInfo> {
    snapshot.iter().find(|process| {
        wanted
            .iter()
            .any(|name| process_name_matches(&process.name, name))
    })
}

/// All descendants of `root`, deepest first.
///
/// Killing in this order keeps children from being re-parented to a
/// still-running parent that would spawn them again.
pub fn descendants_deepest_first(snapshot: &[ProcessInfo], root: u32) -> Vec<u32> {
    let mut levels: Vec<Vec<u32>> = Vec::new();
    let mut frontier = vec![root];
    let mut seen = vec![root];

    while !frontier.is_empty() {
        let next: Vec<u32> = snapshot
            .iter()
            .filter(|p| {
                p.parent_pid.is_some_and(|parent| frontier.contains(&parent))
                    && !seen.contains(&p.pid)
            })
            .map(|p| p.pid)
            .collect();
        seen.extend(&next);
        if !next.is_empty() {
            levels.push(next.clone());
        }
        frontier = next;
    }

    levels.into_iter().rev().flatten().collect()
}
