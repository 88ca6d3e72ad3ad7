//! Executor against real child processes.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;
use unattend_core::{
    AuxiliaryWatchSettings, ExecutorSettings, InstallError, InstallableItem, ItemKind,
    MonitorSettings, NoopWindowInspector, ProcessTablePort,
};
use unattend_install::{
    InstallExecutor, MonitorUpdate, PayloadSource, ProcessMonitor, ResolvedPayload,
};
use unattend_runtime::{SysinfoProcessTable, TokioInstallerLauncher};

fn executor(work: &Path, timeout_ms: u64) -> InstallExecutor {
    let table = Arc::new(SysinfoProcessTable::new());
    let monitor = ProcessMonitor::new(
        table.clone(),
        Arc::new(NoopWindowInspector),
        MonitorSettings::default(),
        AuxiliaryWatchSettings {
            enabled: false,
            ..AuxiliaryWatchSettings::default()
        },
    );
    InstallExecutor::new(
        Arc::new(TokioInstallerLauncher::new(table)),
        monitor,
        ExecutorSettings {
            timeout_ms,
            ..ExecutorSettings::default()
        },
        work.to_path_buf(),
    )
}

fn script(dir: &Path, name: &str, body: &str) -> ResolvedPayload {
    let path: PathBuf = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    ResolvedPayload {
        path,
        source: PayloadSource::Local,
    }
}

async fn last_update(rx: &mut mpsc::UnboundedReceiver<MonitorUpdate>) -> Option<MonitorUpdate> {
    let mut last = None;
    while let Some(update) = rx.recv().await {
        last = Some(update);
    }
    last
}

fn read_pid(path: &Path) -> u32 {
    std::fs::read_to_string(path).unwrap().trim().parse().unwrap()
}

#[tokio::test]
async fn test_timeout_kills_installer_tree() {
    let work = tempfile::tempdir().unwrap();
    let dir = work.path().display().to_string();
    let body = format!("echo $$ > '{dir}/root.pid'\nsleep 60 &\necho $! > '{dir}/child.pid'\nwait");
    let payload = script(work.path(), "slow-setup.sh", &body);
    let item = InstallableItem::new("Slow", ItemKind::Program);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let started = Instant::now();
    let result = executor(work.path(), 300)
        .execute(&item, &payload, &CancellationToken::new(), tx)
        .await;

    let err = assert_err!(result);
    assert!(matches!(err, InstallError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        last_update(&mut rx).await,
        Some(MonitorUpdate::Completed {
            id: item.id,
            success: false
        })
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    let table = SysinfoProcessTable::new();
    for file in ["root.pid", "child.pid"] {
        let pid = read_pid(&work.path().join(file));
        assert!(!table.is_alive(pid), "{file} {pid} survived");
    }
}

#[tokio::test]
async fn test_cancel_stops_installer() {
    let work = tempfile::tempdir().unwrap();
    let payload = script(work.path(), "slow-setup.sh", "sleep 60");
    let item = InstallableItem::new("Slow", ItemKind::Program);
    let (tx, _rx) = mpsc::unbounded_channel();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = assert_err!(
        executor(work.path(), 60_000)
            .execute(&item, &payload, &cancel, tx)
            .await
    );
    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_empty_install_dir_fails_verification() {
    let work = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let payload = script(work.path(), "noop-setup.sh", "exit 0");
    let item = InstallableItem::new("Noop", ItemKind::Program).with_install_dir(target.path());
    let (tx, _rx) = mpsc::unbounded_channel();

    let err = assert_err!(
        executor(work.path(), 10_000)
            .execute(&item, &payload, &CancellationToken::new(), tx)
            .await
    );
    assert!(matches!(err, InstallError::VerificationFailed { .. }));
}

#[tokio::test]
async fn test_installed_files_pass_verification() {
    let work = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let body = format!("touch '{}/game.exe'\nexit 0", target.path().display());
    let payload = script(work.path(), "real-setup.sh", &body);
    let item = InstallableItem::new("Real", ItemKind::Game).with_install_dir(target.path());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let report = assert_ok!(
        executor(work.path(), 10_000)
            .execute(&item, &payload, &CancellationToken::new(), tx)
            .await
    );
    assert_eq!(report.exit_code, 0);
    let verified = report.verified.unwrap();
    assert!(verified.has_executable);
    assert_eq!(
        last_update(&mut rx).await,
        Some(MonitorUpdate::Completed {
            id: item.id,
            success: true
        })
    );
}

#[tokio::test]
async fn test_failure_exit_code() {
    let work = tempfile::tempdir().unwrap();
    let payload = script(work.path(), "bad-setup.sh", "exit 2");
    let item = InstallableItem::new("Bad", ItemKind::Program);
    let (tx, _rx) = mpsc::unbounded_channel();

    let err = assert_err!(
        executor(work.path(), 10_000)
            .execute(&item, &payload, &CancellationToken::new(), tx)
            .await
    );
    assert_eq!(err, InstallError::ExitCode { code: 2 });
}
