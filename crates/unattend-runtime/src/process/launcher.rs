//! Tokio-based installer launcher.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use unattend_core::{
    InstallError, InstallerLauncher, InstallerProcess, LaunchRequest, ProcessTablePort,
    descendants_deepest_first,
};

/// Process creation flag that suppresses the console window.
#[cfg(windows)]
pub(crate) const CREATE_NO_WINDOW: u32 = windows::Win32::System::Threading::CREATE_NO_WINDOW.0;

/// Launches installers with `tokio::process`.
///
/// The process table is used for tree kills: installers routinely spawn
/// helpers (`setup.tmp`, unpackers) that outlive a plain `Child::kill`.
pub struct TokioInstallerLauncher {
    table: Arc<dyn ProcessTablePort>,
}

impl TokioInstallerLauncher {
    pub fn new(table: Arc<dyn ProcessTablePort>) -> Self {
        Self { table }
    }
}

impl InstallerLauncher for TokioInstallerLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<Box<dyn InstallerProcess>, InstallError> {
        let mut cmd = build_command(request);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(windows)]
        if request.hidden {
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let child = cmd.spawn().map_err(|e| {
            InstallError::spawn_failed(format!("{}: {e}", request.program.display()))
        })?;

        let pid = child.id();
        info!(
            target: "unattend.runtime",
            pid = ?pid,
            elevated = request.elevated,
            command = %request.display_command(),
            "Installer started"
        );

        Ok(Box::new(TokioInstallerProcess {
            child,
            pid,
            table: Arc::clone(&self.table),
        }))
    }
}

#[cfg(windows)]
fn build_command(request: &LaunchRequest) -> Command {
    if !request.elevated {
        let mut cmd = Command::new(&request.program);
        // Installers parse their own command lines; `/D=` and `/DIR="…"`
        // break under the standard argv quoting.
        for arg in &request.args {
            cmd.raw_arg(arg);
        }
        return cmd;
    }

    // Start-Process -Verb RunAs raises the UAC prompt; -Wait keeps the
    // PowerShell host alive so the exit code and the tree stay observable.
    let mut script = format!(
        "$p = Start-Process -FilePath {} -Verb RunAs -Wait -PassThru -WindowStyle Hidden",
        ps_quote(&request.program.display().to_string())
    );
    if !request.args.is_empty() {
        let joined = request.args.join(" ");
        script.push_str(&format!(" -ArgumentList {}", ps_quote(&joined)));
    }
    script.push_str("; exit $p.ExitCode");

    let mut cmd = Command::new("powershell.exe");
    cmd.args([
        "-NoProfile",
        "-NonInteractive",
        "-ExecutionPolicy",
        "Bypass",
        "-Command",
        &script,
    ]);
    cmd
}

#[cfg(not(windows))]
fn build_command(request: &LaunchRequest) -> Command {
    if request.elevated {
        warn!(
            target: "unattend.runtime",
            program = %request.program.display(),
            "Elevation is only supported on Windows; launching unelevated"
        );
    }
    let mut cmd = Command::new(&request.program);
    // No shell re-parses argv here, so dialect quotes must go.
    cmd.args(request.args.iter().map(|arg| arg.replace('"', "")));
    cmd
}

/// Single-quote a PowerShell string literal.
#[cfg(any(windows, test))]
fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A running installer spawned by [`TokioInstallerLauncher`].
pub struct TokioInstallerProcess {
    child: Child,
    pid: Option<u32>,
    table: Arc<dyn ProcessTablePort>,
}

#[async_trait]
impl InstallerProcess for TokioInstallerProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn wait(&mut self) -> Result<Option<i32>, InstallError> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }

    async fn kill_tree(&mut self) -> Result<(), InstallError> {
        if let Some(root) = self.pid {
            let snapshot = self.table.snapshot();
            for pid in descendants_deepest_first(&snapshot, root) {
                if let Err(e) = self.table.kill(pid) {
                    // Keep going: the root kill below still matters.
                    warn!(target: "unattend.runtime", pid, error = %e, "Failed to kill descendant");
                }
            }
        }

        match self.child.kill().await {
            Ok(()) => {}
            // Already exited and reaped
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(InstallError::from_io_error(&e)),
        }

        debug!(target: "unattend.runtime", pid = ?self.pid, "Process tree killed");
        Ok(())
    }
}
