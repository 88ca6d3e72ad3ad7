//! `sysinfo`-backed process table.

use std::sync::{Mutex, PoisonError};

use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use tracing::debug;
use unattend_core::{InstallError, ProcessInfo, ProcessTablePort};

/// Process table adapter over a shared `sysinfo::System`.
///
/// Each call refreshes what it needs; the `System` is reused so sysinfo can
/// keep its internal caches warm between polls.
pub struct SysinfoProcessTable {
    system: Mutex<System>,
}

impl SysinfoProcessTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn with_refreshed<T>(&self, pids: Option<&[Pid]>, f: impl FnOnce(&System) -> T) -> T {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        let update = pids.map_or(ProcessesToUpdate::All, ProcessesToUpdate::Some);
        system.refresh_processes(update, true);
        f(&system)
    }
}

impl Default for SysinfoProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

const fn is_running(status: ProcessStatus) -> bool {
    !matches!(status, ProcessStatus::Zombie | ProcessStatus::Dead)
}

impl ProcessTablePort for SysinfoProcessTable {
    fn snapshot(&self) -> Vec<ProcessInfo> {
        self.with_refreshed(None, |system| {
            system
                .processes()
                .values()
                .filter(|process| is_running(process.status()))
                .map(|process| ProcessInfo {
                    pid: process.pid().as_u32(),
                    parent_pid: process.parent().map(Pid::as_u32),
                    name: process.name().to_string_lossy().into_owned(),
                    memory_bytes: process.memory(),
                })
                .collect()
        })
    }

    fn resident_memory(&self, pid: u32) -> Option<u64> {
        let pid = Pid::from_u32(pid);
        self.with_refreshed(Some(&[pid]), |system| {
            system.process(pid).map(sysinfo::Process::memory)
        })
    }

    fn request_close(&self, pid: u32) -> Result<(), InstallError> {
        if !self.is_alive(pid) {
            return Ok(());
        }
        super::signal::request_close(pid)
    }

    fn kill(&self, pid: u32) -> Result<(), InstallError> {
        let sys_pid = Pid::from_u32(pid);
        self.with_refreshed(Some(&[sys_pid]), |system| {
            let Some(process) = system.process(sys_pid) else {
                // Already gone
                return Ok(());
            };
            if process.kill() {
                debug!(target: "unattend.runtime", pid, "Killed process");
                Ok(())
            } else if is_running(process.status()) {
                Err(InstallError::ProcessAccessDenied { pid })
            } else {
                Ok(())
            }
        })
    }

    fn is_alive(&self, pid: u32) -> bool {
        let pid = Pid::from_u32(pid);
        self.with_refreshed(Some(&[pid]), |system| {
            system
                .process(pid)
                .is_some_and(|process| is_running(process.status()))
        })
    }
}
