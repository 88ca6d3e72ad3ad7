//! Shared fakes for manager tests.
//!
//! Payload file names pick the fake installer's behaviour:
//! `hang*` runs until killed, `exit<N>*` exits with N, `progress*` gets a
//! PID and shows a ramping progress bar, anything else exits 0.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use unattend_core::{
    AuxiliaryWatchSettings, ConnectivityProbe, DownloadProgressCallback, EventBroadcaster,
    ExecutorSettings, InstallError, InstallEvent, InstallStatus, InstallableItem,
    InstallerLauncher, InstallerProcess, ItemId, LaunchRequest, MonitorSettings,
    NoopWindowInspector, PayloadDownloader, PayloadSearchPort, ProcessInfo, ProcessTablePort,
    ProgressContext, ProgressInspector, QueueSettings, RunSummary,
};
use unattend_install::{
    AcquisitionResolver, InstallExecutor, InstallManager, InstallManagerDeps, ProcessMonitor,
    ResolverDeps, build_install_manager,
};

pub const PROGRESS_PID: u32 = 4242;

pub struct Offline;

#[async_trait]
impl ConnectivityProbe for Offline {
    async fn is_reachable(&self) -> bool {
        false
    }
}

pub struct NoDownload;

#[async_trait]
impl PayloadDownloader for NoDownload {
    async fn download(
        &self,
        _url: &str,
        _dest_dir: &Path,
        _on_progress: &DownloadProgressCallback<'_>,
        _cancel: &CancellationToken,
    ) -> Result<PathBuf, InstallError> {
        Err(InstallError::network("offline"))
    }
}

pub struct NoSearch;

#[async_trait]
impl PayloadSearchPort for NoSearch {
    async fn search(&self, _item: &InstallableItem) -> Option<PathBuf> {
        None
    }
}

/// Process table holding only the fake installers that are still running.
#[derive(Default)]
pub struct FakeTable {
    alive: Mutex<HashSet<u32>>,
}

impl FakeTable {
    fn spawn(&self, pid: u32) {
        self.alive.lock().unwrap().insert(pid);
    }

    fn exit(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
    }
}

impl ProcessTablePort for FakeTable {
    fn snapshot(&self) -> Vec<ProcessInfo> {
        self.alive
            .lock()
            .unwrap()
            .iter()
            .map(|pid| ProcessInfo::new(*pid, None, "setup.exe"))
            .collect()
    }

    fn resident_memory(&self, _pid: u32) -> Option<u64> {
        None
    }

    fn request_close(&self, pid: u32) -> Result<(), InstallError> {
        self.exit(pid);
        Ok(())
    }

    fn kill(&self, pid: u32) -> Result<(), InstallError> {
        self.exit(pid);
        Ok(())
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }
}

/// Progress bar that moves forward, with one step backwards.
pub struct RampDetector {
    calls: Mutex<usize>,
}

impl RampDetector {
    const STEPS: [f64; 6] = [12.0, 30.0, 25.0, 60.0, 85.0, 99.0];
}

impl ProgressInspector for RampDetector {
    fn name(&self) -> &'static str {
        "ramp"
    }

    fn inspect(&self, _ctx: &ProgressContext<'_>) -> Option<f64> {
        let mut calls = self.calls.lock().unwrap();
        let value = Self::STEPS.get(*calls).copied();
        *calls += 1;
        value
    }
}

#[derive(Clone, Copy, Debug)]
enum Behaviour {
    Exit(i32),
    Hang,
    Progress,
}

impl Behaviour {
    fn from_program(program: &Path) -> Self {
        let name = program
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        if name.starts_with("hang") {
            Self::Hang
        } else if name.starts_with("progress") {
            Self::Progress
        } else if let Some(rest) = name.strip_prefix("exit") {
            let code: String = rest.chars().take_while(char::is_ascii_digit).collect();
            Self::Exit(code.parse().unwrap_or(1))
        } else {
            Self::Exit(0)
        }
    }
}

/// Launcher that never starts a real process.
#[derive(Default)]
pub struct FakeLauncher {
    table: Arc<FakeTable>,
    launched: Mutex<Vec<PathBuf>>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn launched(&self) -> Vec<PathBuf> {
        self.launched.lock().unwrap().clone()
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

impl InstallerLauncher for FakeLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<Box<dyn InstallerProcess>, InstallError> {
        let behaviour = Behaviour::from_program(&request.program);
        self.launched.lock().unwrap().push(request.program.clone());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let pid = matches!(behaviour, Behaviour::Progress).then_some(PROGRESS_PID);
        if let Some(pid) = pid {
            self.table.spawn(pid);
        }
        Ok(Box::new(FakeProcess {
            behaviour,
            pid,
            killed: CancellationToken::new(),
            table: Arc::clone(&self.table),
            running: Arc::clone(&self.running),
        }))
    }
}

struct FakeProcess {
    behaviour: Behaviour,
    pid: Option<u32>,
    killed: CancellationToken,
    table: Arc<FakeTable>,
    running: Arc<AtomicUsize>,
}

#[async_trait]
impl InstallerProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn wait(&mut self) -> Result<Option<i32>, InstallError> {
        let code = match self.behaviour {
            Behaviour::Exit(code) => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Some(code)
            }
            Behaviour::Progress => {
                tokio::time::sleep(Duration::from_millis(400)).await;
                Some(0)
            }
            Behaviour::Hang => {
                self.killed.cancelled().await;
                None
            }
        };
        if let Some(pid) = self.pid {
            self.table.exit(pid);
        }
        Ok(code)
    }

    async fn kill_tree(&mut self) -> Result<(), InstallError> {
        self.killed.cancel();
        Ok(())
    }
}

impl Drop for FakeProcess {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub manager: InstallManager,
    pub launcher: Arc<FakeLauncher>,
    pub history: Vec<InstallEvent>,
    events: mpsc::UnboundedReceiver<InstallEvent>,
    payloads: TempDir,
    _work: TempDir,
}

pub fn harness(max_visible: u32) -> Harness {
    let payloads = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    let launcher = Arc::new(FakeLauncher::default());
    let table: Arc<dyn ProcessTablePort> = launcher.table.clone();

    let monitor = ProcessMonitor::new(
        table,
        Arc::new(NoopWindowInspector),
        MonitorSettings {
            progress_poll_ms: 20,
            ..MonitorSettings::default()
        },
        AuxiliaryWatchSettings::default(),
    )
    .with_detectors(vec![Box::new(RampDetector {
        calls: Mutex::new(0),
    })])
    .with_temp_dir(work.path());

    let resolver = AcquisitionResolver::new(
        ResolverDeps {
            embedded: None,
            probe: Arc::new(Offline),
            downloader: Arc::new(NoDownload),
            search: Arc::new(NoSearch),
        },
        Vec::new(),
        work.path().to_path_buf(),
    );
    let executor = InstallExecutor::new(
        launcher.clone(),
        monitor,
        ExecutorSettings::default(),
        work.path().to_path_buf(),
    );

    let broadcaster = EventBroadcaster::new();
    let (tx, events) = mpsc::unbounded_channel();
    broadcaster.add_listener(move |event| {
        let _ = tx.send(event.clone());
    });

    let manager = build_install_manager(InstallManagerDeps {
        resolver,
        executor,
        event_emitter: Arc::new(broadcaster),
        config: QueueSettings { max_visible },
    });

    Harness {
        manager,
        launcher,
        history: Vec::new(),
        events,
        payloads,
        _work: work,
    }
}

impl Harness {
    /// Write a fake payload and return its absolute path.
    pub fn payload(&self, file_name: &str) -> PathBuf {
        let path = self.payloads.path().join(file_name);
        std::fs::write(&path, b"MZ").unwrap();
        path
    }

    pub fn item(&self, name: &str, file_name: &str) -> InstallableItem {
        InstallableItem::new(name, unattend_core::ItemKind::Game)
            .with_local_path(self.payload(file_name))
    }

    /// Receive events until one matches, keeping all of them in `history`.
    pub async fn wait_for(&mut self, mut matches: impl FnMut(&InstallEvent) -> bool) -> InstallEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(30), self.events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event channel closed");
            self.history.push(event.clone());
            if matches(&event) {
                return event;
            }
        }
    }

    pub async fn wait_for_status(&mut self, id: ItemId, status: InstallStatus) {
        self.wait_for(|event| {
            matches!(event, InstallEvent::StatusChanged { id: got, status: s, .. } if *got == id && *s == status)
        })
        .await;
    }

    pub async fn wait_for_completion(&mut self) -> RunSummary {
        match self
            .wait_for(|event| matches!(event, InstallEvent::InstallationComplete { .. }))
            .await
        {
            InstallEvent::InstallationComplete { summary } => summary,
            _ => unreachable!(),
        }
    }

    /// Statuses recorded for `id`, in order.
    pub fn statuses(&self, id: ItemId) -> Vec<InstallStatus> {
        self.history
            .iter()
            .filter_map(|event| match event {
                InstallEvent::StatusChanged { id: got, status, .. } if *got == id => Some(*status),
                _ => None,
            })
            .collect()
    }

    /// Progress values recorded for `id`, in order.
    pub fn progress(&self, id: ItemId) -> Vec<u8> {
        self.history
            .iter()
            .filter_map(|event| match event {
                InstallEvent::ProgressChanged { id: got, percent } if *got == id => Some(*percent),
                _ => None,
            })
            .collect()
    }

    /// Panics if the history ever shows two items installing at once.
    pub fn assert_single_flight(&self) {
        let mut installing: Option<ItemId> = None;
        for event in &self.history {
            if let InstallEvent::StatusChanged { id, status, .. } = event {
                match status {
                    InstallStatus::Installing => {
                        assert!(
                            installing.is_none(),
                            "{id} started while {installing:?} was installing"
                        );
                        installing = Some(*id);
                    }
                    status if status.is_terminal() && installing == Some(*id) => installing = None,
                    _ => {}
                }
            }
        }
    }
}
