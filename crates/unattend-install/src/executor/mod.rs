//! Installation executor.
//!
//! Builds the silent command line, launches the installer hidden (and
//! elevated when asked), hands the PID to the process monitor and waits for
//! exit, timeout or cancellation. A run only counts as successful if the exit
//! code is in the success list and the install directory passes
//! verification.

mod command_line;
mod sidecar;
mod verify;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use unattend_core::{
    ExecutorSettings, InstallError, InstallStrategy, InstallableItem, InstallerLauncher,
    InstallerProcess, LaunchRequest, item_work_dir,
};

pub use command_line::{
    InstallerFramework, apply_install_dir, insert_before_install_dir, msiexec_args, quote,
    tokenize,
};
pub use sidecar::{INNO_SCRIPT_NAME, OPTIONS_INI_NAME, inno_script, options_ini, write_sidecars};
pub use verify::{VerifyReport, verify_install_dir, verify_install_dir_async};

use crate::monitor::{MonitorUpdate, MonitoringSession, ProcessMonitor};
use crate::resolver::ResolvedPayload;

pub const BATCH_WRAPPER_NAME: &str = "unattend-install.cmd";

/// Outcome of a successful installer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub exit_code: i32,
    pub duration: Duration,
    pub framework: InstallerFramework,
    /// `None` when the item has no install directory to check.
    pub verified: Option<VerifyReport>,
}

/// Silent arguments for the payload with the install-dir override merged in.
pub fn silent_arguments(item: &InstallableItem, payload: &Path) -> (InstallerFramework, Vec<String>) {
    let mut tokens = tokenize(&item.silent_arguments);
    let framework = InstallerFramework::detect(item.strategy, payload, &tokens);
    if let Some(dir) = &item.install_dir {
        if !apply_install_dir(&mut tokens, framework, dir) {
            debug!(target: "unattend.install", id = %item.id, "Unknown installer, install dir left to answer file");
        }
    }
    (framework, tokens)
}

/// Program and arguments that run the payload.
pub fn invocation(framework: InstallerFramework, payload: &Path, tokens: Vec<String>) -> (PathBuf, Vec<String>) {
    if framework == InstallerFramework::Msi {
        (PathBuf::from("msiexec.exe"), msiexec_args(payload, &tokens))
    } else {
        (payload.to_path_buf(), tokens)
    }
}

pub fn batch_script(program: &Path, args: &[String]) -> String {
    let mut line = quote(program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    let mut out = String::from("@echo off\r\n");
    let _ = write!(out, "{line}\r\n");
    out.push_str("exit /b %ERRORLEVEL%\r\n");
    out
}

enum Outcome {
    Exited(Result<Option<i32>, InstallError>),
    TimedOut,
    Cancelled,
}

/// Runs one installer to completion.
#[derive(Clone)]
pub struct InstallExecutor {
    launcher: Arc<dyn InstallerLauncher>,
    monitor: ProcessMonitor,
    settings: ExecutorSettings,
    work_dir: PathBuf,
}

impl InstallExecutor {
    pub fn new(
        launcher: Arc<dyn InstallerLauncher>,
        monitor: ProcessMonitor,
        settings: ExecutorSettings,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            launcher,
            monitor,
            settings,
            work_dir,
        }
    }

    /// Build the launch request, writing answer files and the batch wrapper
    /// into the item's working directory.
    pub async fn prepare(
        &self,
        item: &InstallableItem,
        payload: &Path,
    ) -> Result<(InstallerFramework, LaunchRequest), InstallError> {
        let item_dir = item_work_dir(&self.work_dir, &item.name);
        tokio::fs::create_dir_all(&item_dir)
            .await
            .map_err(|e| InstallError::from_io_error(&e))?;

        let (framework, mut tokens) = silent_arguments(item, payload);
        if self.settings.write_sidecars {
            let extra = write_sidecars(framework, &item_dir, &item.name, item.install_dir.as_deref()).await;
            insert_before_install_dir(&mut tokens, extra);
        }
        let (program, args) = invocation(framework, payload, tokens);

        let elevated =
            item.strategy == InstallStrategy::ElevatedBatch || item.requires_elevation;
        let request = if elevated {
            let wrapper = item_dir.join(BATCH_WRAPPER_NAME);
            tokio::fs::write(&wrapper, batch_script(&program, &args))
                .await
                .map_err(|e| InstallError::from_io_error(&e))?;
            LaunchRequest::new("cmd.exe")
                .with_args(vec!["/C".to_string(), quote(&wrapper)])
                .elevated(true)
        } else {
            LaunchRequest::new(program).with_args(args)
        };

        Ok((framework, request.with_working_dir(item_dir)))
    }

    /// Install `payload` for `item`.
    ///
    /// Monitor updates for the run are sent on `updates`. On timeout or
    /// cancellation the whole process tree is killed before returning.
    pub async fn execute(
        &self,
        item: &InstallableItem,
        payload: &ResolvedPayload,
        cancel: &CancellationToken,
        updates: mpsc::UnboundedSender<MonitorUpdate>,
    ) -> Result<ExecutionReport, InstallError> {
        let (framework, request) = self.prepare(item, &payload.path).await?;
        info!(
            target: "unattend.install",
            id = %item.id,
            framework = ?framework,
            elevated = request.elevated,
            command = %request.display_command(),
            "Launching installer"
        );

        let started = Instant::now();
        let mut process = self.launcher.launch(&request)?;
        let session = process
            .pid()
            .map(|pid| self.monitor.watch(pid, item.id, cancel, updates.clone()));

        let timeout = self.settings.timeout();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Outcome::Cancelled,
            result = process.wait() => Outcome::Exited(result),
            () = tokio::time::sleep(timeout) => Outcome::TimedOut,
        };

        let exit = match outcome {
            Outcome::Exited(result) => result,
            Outcome::TimedOut => {
                warn!(target: "unattend.install", id = %item.id, timeout_secs = timeout.as_secs(), "Installer timed out");
                force_stop(&mut process).await;
                finish_session(session, &updates, item, None).await;
                return Err(InstallError::timeout(timeout));
            }
            Outcome::Cancelled => {
                info!(target: "unattend.install", id = %item.id, "Install cancelled, stopping installer");
                force_stop(&mut process).await;
                finish_session(session, &updates, item, None).await;
                return Err(InstallError::Cancelled);
            }
        };

        let code = match exit {
            Ok(code) => code,
            Err(e) => {
                finish_session(session, &updates, item, None).await;
                return Err(e);
            }
        };
        finish_session(session, &updates, item, code).await;

        let code = code.ok_or_else(|| InstallError::other("installer was terminated by a signal"))?;
        if !self.settings.is_success_code(code) {
            return Err(InstallError::ExitCode { code });
        }

        let verified = match &item.install_dir {
            Some(dir) => Some(verify_install_dir_async(dir.clone(), self.settings.verify_min_files).await?),
            None => None,
        };

        let duration = started.elapsed();
        info!(target: "unattend.install", id = %item.id, code, elapsed = ?duration, "Installer finished");
        Ok(ExecutionReport {
            exit_code: code,
            duration,
            framework,
            verified,
        })
    }
}

async fn force_stop(process: &mut Box<dyn InstallerProcess>) {
    if let Err(e) = process.kill_tree().await {
        warn!(target: "unattend.install", error = %e, "Tree kill incomplete");
    }
    // Reap the root so it does not linger as a zombie.
    if let Err(e) = process.wait().await {
        debug!(target: "unattend.install", error = %e, "Wait after kill failed");
    }
}

async fn finish_session(
    session: Option<MonitoringSession>,
    updates: &mpsc::UnboundedSender<MonitorUpdate>,
    item: &InstallableItem,
    code: Option<i32>,
) {
    match session {
        Some(session) => session.finish(code).await,
        None => {
            let _ = updates.send(MonitorUpdate::Completed {
                id: item.id,
                success: code == Some(0),
            });
        }
    }
}
