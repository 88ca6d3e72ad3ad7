//! Graceful close requests.
//!
//! # Platform behavior
//! - Unix: SIGTERM via `nix`
//! - Windows: `taskkill /PID <pid>` without `/F`, which posts `WM_CLOSE` to
//!   the process's windows

use unattend_core::InstallError;

#[cfg(unix)]
pub(crate) fn request_close(pid: u32) -> Result<(), InstallError> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| InstallError::ProcessAccessDenied { pid })?;
    match signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
        // ESRCH: already gone
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(Errno::EPERM) => Err(InstallError::ProcessAccessDenied { pid }),
        Err(e) => Err(InstallError::other(format!("SIGTERM to {pid} failed: {e}"))),
    }
}

#[cfg(windows)]
pub(crate) fn request_close(pid: u32) -> Result<(), InstallError> {
    use std::os::windows::process::CommandExt;

    use super::launcher::CREATE_NO_WINDOW;

    let output = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .creation_flags(CREATE_NO_WINDOW)
        .output()
        .map_err(|e| InstallError::from_io_error(&e))?;

    if output.status.success() {
        Ok(())
    } else {
        // 128: process not found
        match output.status.code() {
            Some(128) => Ok(()),
            _ => Err(InstallError::ProcessAccessDenied { pid }),
        }
    }
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_stops_sleep() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");
        let pid = child.id().expect("no PID");

        super::request_close(pid).unwrap();
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }
}
