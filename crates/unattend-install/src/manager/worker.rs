//! Install worker pipeline.
//!
//! The worker resolves and installs exactly one item. It never touches the
//! queue: every stage change, progress value and log line goes back to the
//! actor as a [`WorkerMessage`] tagged with the job's lease, and the actor
//! decides what to apply.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use unattend_core::{DownloadProgress, InstallError, InstallStatus, InstallableItem, ItemId};

use crate::executor::{ExecutionReport, InstallExecutor};
use crate::monitor::MonitorUpdate;
use crate::progress::ProgressThrottle;
use crate::resolver::{AcquisitionObserver, AcquisitionResolver};

use super::actor::{Command, LeaseId};

/// Dependencies for the install worker.
#[derive(Clone)]
pub struct WorkerDeps {
    pub resolver: AcquisitionResolver,
    pub executor: InstallExecutor,
}

/// What a worker reports.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Stage(InstallStatus),
    Progress(u8),
    Log(String),
    Finished(Result<ExecutionReport, InstallError>),
}

#[derive(Debug)]
pub(crate) struct WorkerMessage {
    pub lease: LeaseId,
    pub id: ItemId,
    pub event: WorkerEvent,
}

/// A job handed to the worker. Value type, no references into the actor.
pub(crate) struct InstallJob {
    pub lease: LeaseId,
    pub item: InstallableItem,
    pub cancel: CancellationToken,
    pub tx: mpsc::UnboundedSender<Command>,
}

struct Reporter {
    lease: LeaseId,
    id: ItemId,
    name: String,
    tx: mpsc::UnboundedSender<Command>,
    throttle: Mutex<ProgressThrottle>,
}

impl Reporter {
    fn send(&self, event: WorkerEvent) {
        let message = WorkerMessage {
            lease: self.lease,
            id: self.id,
            event,
        };
        if self.tx.send(Command::Worker(message)).is_err() {
            debug!(target: "unattend.install", id = %self.id, "Manager gone, dropping worker message");
        }
    }

    fn forward(&self, update: MonitorUpdate) {
        match update {
            MonitorUpdate::Progress { percent, .. } => self.send(WorkerEvent::Progress(percent)),
            MonitorUpdate::Log { message, .. } => self.send(WorkerEvent::Log(message)),
            MonitorUpdate::AuxiliaryCleanup { terminated, .. } => self.send(WorkerEvent::Log(format!(
                "{}: closed {} helper process(es)",
                self.name,
                terminated.len()
            ))),
            MonitorUpdate::Completed { success, .. } => {
                debug!(target: "unattend.install", id = %self.id, success, "Monitor completed");
            }
        }
    }
}

impl AcquisitionObserver for Reporter {
    fn stage(&self, status: InstallStatus) {
        self.send(WorkerEvent::Stage(status));
    }

    fn download_progress(&self, progress: DownloadProgress) {
        let should_emit = self
            .throttle
            .lock()
            .map(|mut throttle| throttle.admit(progress))
            .unwrap_or(false);
        if !should_emit {
            return;
        }
        let line = match progress.percent() {
            Some(percent) => format!("Downloading {}: {percent}%", self.name),
            None => format!("Downloading {}: {} MB", self.name, progress.downloaded / (1024 * 1024)),
        };
        self.send(WorkerEvent::Log(line));
    }
}

/// Run a job to completion and report `Finished` as the last message.
pub(crate) async fn run_job(job: InstallJob, deps: WorkerDeps) {
    let reporter = Reporter {
        lease: job.lease,
        id: job.item.id,
        name: job.item.name.clone(),
        tx: job.tx.clone(),
        throttle: Mutex::new(ProgressThrottle::default()),
    };
    let result = install(&job, &deps, &reporter).await;
    reporter.send(WorkerEvent::Finished(result));
}

async fn install(
    job: &InstallJob,
    deps: &WorkerDeps,
    reporter: &Reporter,
) -> Result<ExecutionReport, InstallError> {
    let payload = deps.resolver.resolve(&job.item, reporter, &job.cancel).await?;
    if job.cancel.is_cancelled() {
        return Err(InstallError::Cancelled);
    }
    reporter.send(WorkerEvent::Log(format!(
        "{}: installing from {}",
        job.item.name,
        payload.path.display()
    )));
    reporter.send(WorkerEvent::Stage(InstallStatus::Installing));

    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
    let forward = async {
        while let Some(update) = updates_rx.recv().await {
            reporter.forward(update);
        }
    };
    let execute = deps
        .executor
        .execute(&job.item, &payload, &job.cancel, updates_tx);

    let (result, ()) = tokio::join!(execute, forward);
    result
}
