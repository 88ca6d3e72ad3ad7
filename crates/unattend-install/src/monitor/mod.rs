//! Process monitor.
//!
//! Watches a running installer: infers progress from its windows and
//! resource use, and cleans up auxiliary helper processes. One
//! [`MonitoringSession`] exists per installing item; its tasks live in a
//! `JoinSet` and are joined by [`MonitoringSession::finish`].

mod auxiliary;
mod detectors;
mod text;

use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use unattend_core::{
    AuxiliaryWatchSettings, ItemId, MonitorSettings, ProcessTablePort, ProgressContext,
    ProgressInspector, WindowInfo, WindowInspectorPort, descendants_deepest_first,
};

pub use auxiliary::{AuxiliaryOutcome, AuxiliaryWatch};
pub use detectors::{
    ElapsedTime, FrameworkHeuristic, NativeProgressBar, ResourceGrowth, WindowTitle,
    default_detectors,
};
pub use text::{parse_percent, parse_progress_text};

use crate::progress::ProgressGate;

/// What a monitoring session reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorUpdate {
    /// Gated, strictly increasing progress.
    Progress {
        id: ItemId,
        percent: u8,
        /// Name of the detector that produced the value.
        source: &'static str,
    },
    Log { id: ItemId, message: String },
    /// Auxiliary helpers were terminated.
    AuxiliaryCleanup { id: ItemId, terminated: Vec<u32> },
    /// The installer exited; `success` means exit code 0.
    Completed { id: ItemId, success: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    PreCheck,
    ActiveWatch,
    Cleanup,
    Done,
}

/// One accepted progress sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    pub percent: u8,
    pub source: &'static str,
}

/// Factory for monitoring sessions.
#[derive(Clone)]
pub struct ProcessMonitor {
    table: Arc<dyn ProcessTablePort>,
    windows: Arc<dyn WindowInspectorPort>,
    detectors: Arc<[Box<dyn ProgressInspector>]>,
    settings: MonitorSettings,
    auxiliary: AuxiliaryWatchSettings,
    temp_dir: PathBuf,
}

impl ProcessMonitor {
    pub fn new(
        table: Arc<dyn ProcessTablePort>,
        windows: Arc<dyn WindowInspectorPort>,
        settings: MonitorSettings,
        auxiliary: AuxiliaryWatchSettings,
    ) -> Self {
        Self {
            detectors: default_detectors(&settings).into(),
            table,
            windows,
            settings,
            auxiliary,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Replace the detector chain.
    #[must_use]
    pub fn with_detectors(mut self, detectors: Vec<Box<dyn ProgressInspector>>) -> Self {
        self.detectors = detectors.into();
        self
    }

    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Start watching `pid` on behalf of `item_id`.
    ///
    /// Must be called from within a tokio runtime. The session stops on its
    /// own when `cancel` fires, but [`MonitoringSession::finish`] is what
    /// joins the tasks and sends `Completed`.
    pub fn watch(
        &self,
        pid: u32,
        item_id: ItemId,
        cancel: &CancellationToken,
        updates: mpsc::UnboundedSender<MonitorUpdate>,
    ) -> MonitoringSession {
        let token = cancel.child_token();
        let (phase, _) = watch::channel(MonitorPhase::PreCheck);
        let mut tasks = JoinSet::new();

        if !self.table.is_alive(pid) {
            debug!(target: "unattend.monitor", id = %item_id, pid, "Installer not in process table yet");
        }
        phase.send_replace(MonitorPhase::ActiveWatch);

        let samples = progress_stream(self.clone(), pid, token.clone());
        let progress_updates = updates.clone();
        tasks.spawn(async move {
            let mut samples = pin!(samples);
            while let Some(sample) = samples.next().await {
                trace!(target: "unattend.monitor", id = %item_id, percent = sample.percent, source = sample.source, "Progress");
                let update = MonitorUpdate::Progress {
                    id: item_id,
                    percent: sample.percent,
                    source: sample.source,
                };
                if progress_updates.send(update).is_err() {
                    break;
                }
            }
        });

        if self.auxiliary.enabled {
            let aux = AuxiliaryWatch::new(Arc::clone(&self.table), self.auxiliary.clone());
            let aux_token = token.clone();
            let aux_updates = updates.clone();
            tasks.spawn(async move {
                match aux.run(&aux_token).await {
                    AuxiliaryOutcome::Cleaned { terminated } => {
                        let _ = aux_updates.send(MonitorUpdate::AuxiliaryCleanup {
                            id: item_id,
                            terminated,
                        });
                    }
                    AuxiliaryOutcome::NoUnwanted => {
                        let _ = aux_updates.send(MonitorUpdate::Log {
                            id: item_id,
                            message: "Extraction helper finished without leftovers".to_string(),
                        });
                    }
                    AuxiliaryOutcome::NoExtractor | AuxiliaryOutcome::Cancelled => {}
                }
            });
        }

        MonitoringSession {
            item_id,
            cancel: token,
            tasks,
            phase,
            updates,
        }
    }

    /// Run the detector chain once. First finite value wins.
    fn sample(
        &self,
        pid: u32,
        elapsed: Duration,
        started_at: SystemTime,
    ) -> Option<(f64, &'static str)> {
        // Installers often hand their UI to a child (Inno's setup.tmp).
        let snapshot = self.table.snapshot();
        let mut pids = vec![pid];
        pids.extend(descendants_deepest_first(&snapshot, pid));
        let windows: Vec<WindowInfo> = pids
            .iter()
            .flat_map(|p| self.windows.windows_for_process(*p))
            .collect();

        let ctx = ProgressContext {
            pid,
            elapsed,
            started_at,
            windows: &windows,
            window_inspector: self.windows.as_ref(),
            process_table: self.table.as_ref(),
            temp_dir: self.temp_dir.clone(),
        };
        self.detectors.iter().find_map(|detector| {
            detector
                .inspect(&ctx)
                .filter(|value| value.is_finite())
                .map(|value| (value, detector.name()))
        })
    }
}

/// Gated progress samples for `pid` until it exits or `cancel` fires.
pub fn progress_stream(
    monitor: ProcessMonitor,
    pid: u32,
    cancel: CancellationToken,
) -> impl Stream<Item = ProgressSample> {
    stream! {
        let started = Instant::now();
        let started_at = SystemTime::now();
        let mut gate = ProgressGate::new();
        let mut ticker = interval(monitor.settings.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !monitor.table.is_alive(pid) {
                debug!(target: "unattend.monitor", pid, "Installer gone, progress watch ends");
                break;
            }

            let Some((raw, source)) = monitor.sample(pid, started.elapsed(), started_at) else {
                continue;
            };
            if let Some(percent) = gate.admit(raw) {
                yield ProgressSample { percent, source };
            }
        }
    }
}

/// Live monitoring of one installing item.
pub struct MonitoringSession {
    item_id: ItemId,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
    phase: watch::Sender<MonitorPhase>,
    updates: mpsc::UnboundedSender<MonitorUpdate>,
}

impl MonitoringSession {
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn phase(&self) -> MonitorPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<MonitorPhase> {
        self.phase.subscribe()
    }

    /// Stop all watchers, wait for them and report the exit.
    ///
    /// An auxiliary cleanup already under way runs to completion first.
    pub async fn finish(mut self, exit_code: Option<i32>) {
        self.phase.send_replace(MonitorPhase::Cleanup);
        self.cancel.cancel();

        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    warn!(target: "unattend.monitor", id = %self.item_id, error = %e, "Monitor task panicked");
                }
            }
        }

        let _ = self.updates.send(MonitorUpdate::Completed {
            id: self.item_id,
            success: exit_code == Some(0),
        });
        self.phase.send_replace(MonitorPhase::Done);
    }
}

impl Drop for MonitoringSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use unattend_core::{InstallError, InstallableItem, ItemKind, NoopWindowInspector, ProcessInfo};

    use super::*;

    struct Table(Mutex<Vec<ProcessInfo>>);

    impl Table {
        fn with(processes: Vec<ProcessInfo>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(processes)))
        }

        fn exit(&self, pid: u32) {
            self.0.lock().unwrap().retain(|p| p.pid != pid);
        }
    }

    impl ProcessTablePort for Table {
        fn snapshot(&self) -> Vec<ProcessInfo> {
            self.0.lock().unwrap().clone()
        }
        fn resident_memory(&self, _pid: u32) -> Option<u64> {
            None
        }
        fn request_close(&self, _pid: u32) -> Result<(), InstallError> {
            Ok(())
        }
        fn kill(&self, pid: u32) -> Result<(), InstallError> {
            self.exit(pid);
            Ok(())
        }
        fn is_alive(&self, pid: u32) -> bool {
            self.0.lock().unwrap().iter().any(|p| p.pid == pid)
        }
    }

    /// Replays a fixed sequence of raw values.
    struct Script(Mutex<Vec<f64>>);

    impl ProgressInspector for Script {
        fn name(&self) -> &'static str {
            "script"
        }

        fn inspect(&self, _ctx: &ProgressContext<'_>) -> Option<f64> {
            let mut values = self.0.lock().unwrap();
            (!values.is_empty()).then(|| values.remove(0))
        }
    }

    fn monitor(table: Arc<Table>, script: Vec<f64>) -> ProcessMonitor {
        let auxiliary = AuxiliaryWatchSettings {
            enabled: false,
            ..AuxiliaryWatchSettings::default()
        };
        ProcessMonitor::new(
            table,
            Arc::new(NoopWindowInspector),
            MonitorSettings::default(),
            auxiliary,
        )
        .with_detectors(vec![Box::new(Script(Mutex::new(script)))])
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_monotonic() {
        let table = Table::with(vec![ProcessInfo::new(10, None, "setup.exe")]);
        let samples = progress_stream(
            monitor(table.clone(), vec![10.0, 8.0, f64::NAN, 10.2, 35.0, 120.0]),
            10,
            CancellationToken::new(),
        );
        let mut samples = pin!(samples);

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(samples.next().await.unwrap().percent);
        }
        assert_eq!(seen, vec![10, 35, 100]);

        table.exit(10);
        assert!(samples.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_finish_reports_completion() {
        let table = Table::with(vec![ProcessInfo::new(10, None, "setup.exe")]);
        let item = InstallableItem::new("7-Zip", ItemKind::Program);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let session = monitor(table.clone(), vec![40.0]).watch(10, item.id, &CancellationToken::new(), tx);
        assert_eq!(session.phase(), MonitorPhase::ActiveWatch);
        let mut phase = session.subscribe_phase();

        tokio::time::sleep(Duration::from_secs(2)).await;
        session.finish(Some(0)).await;

        assert_eq!(
            rx.recv().await,
            Some(MonitorUpdate::Progress {
                id: item.id,
                percent: 40,
                source: "script"
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(MonitorUpdate::Completed {
                id: item.id,
                success: true
            })
        );
        assert_eq!(*phase.borrow_and_update(), MonitorPhase::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nonzero_exit_is_not_success() {
        let table = Table::with(vec![ProcessInfo::new(10, None, "setup.exe")]);
        let item = InstallableItem::new("7-Zip", ItemKind::Program);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let session = monitor(table, Vec::new()).watch(10, item.id, &CancellationToken::new(), tx);
        session.finish(Some(3010)).await;

        assert_eq!(
            rx.recv().await,
            Some(MonitorUpdate::Completed {
                id: item.id,
                success: false
            })
        );
    }
}
