//! The queue actor.
//!
//! Owns the [`VisibleQueue`] and is its only writer. Handle commands and
//! worker messages arrive on one channel; the actor keeps a weak sender so
//! the channel closes once every handle and worker is gone.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use unattend_core::{
    InstallError, InstallEvent, InstallEventEmitterPort, InstallStatus, InstallableItem, ItemId,
    ItemSummary, QueueSnapshot,
};

use crate::queue::{Placement, VisibleQueue};

use super::run_state::RunTracker;
use super::worker::{InstallJob, WorkerDeps, WorkerEvent, WorkerMessage, run_job};

/// Lease ID for the active job.
///
/// Messages from a worker whose lease is no longer current are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct LeaseId(pub(crate) u64);

type Reply<T> = oneshot::Sender<Result<T, InstallError>>;

pub(crate) enum Command {
    Enqueue {
        item: Box<InstallableItem>,
        reply: Reply<ItemId>,
    },
    Cancel {
        id: ItemId,
        reply: Reply<()>,
    },
    Skip {
        id: ItemId,
        reply: Reply<()>,
    },
    Retry {
        id: ItemId,
        reply: Reply<()>,
    },
    Start {
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    ClearFinished {
        reply: Reply<usize>,
    },
    Snapshot {
        reply: Reply<QueueSnapshot>,
    },
    Shutdown {
        reply: Reply<()>,
    },
    Worker(WorkerMessage),
}

/// State for the job currently owned by a worker.
struct ActiveJob {
    lease: LeaseId,
    id: ItemId,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub(crate) struct InstallActor {
    queue: VisibleQueue,
    deps: WorkerDeps,
    emitter: Arc<dyn InstallEventEmitterPort>,
    rx: mpsc::UnboundedReceiver<Command>,
    tx: mpsc::WeakUnboundedSender<Command>,
    running: bool,
    stop_requested: bool,
    active: Option<ActiveJob>,
    run: Option<RunTracker>,
    next_lease: u64,
    root_cancel: CancellationToken,
    fatal: Arc<Mutex<Option<InstallError>>>,
}

impl InstallActor {
    pub(crate) fn new(
        queue: VisibleQueue,
        deps: WorkerDeps,
        emitter: Arc<dyn InstallEventEmitterPort>,
        rx: mpsc::UnboundedReceiver<Command>,
        tx: mpsc::WeakUnboundedSender<Command>,
        root_cancel: CancellationToken,
        fatal: Arc<Mutex<Option<InstallError>>>,
    ) -> Self {
        Self {
            queue,
            deps,
            emitter,
            rx,
            tx,
            running: false,
            stop_requested: false,
            active: None,
            run: None,
            next_lease: 0,
            root_cancel,
            fatal,
        }
    }

    /// Process commands until shutdown, a fatal error, or every sender is
    /// dropped.
    pub(crate) async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Shutdown { reply } => {
                    self.shutdown().await;
                    let _ = reply.send(Ok(()));
                    return;
                }
                command => self.handle(command),
            }
            if self.is_fatal() {
                self.root_cancel.cancel();
                return;
            }
        }
        self.shutdown().await;
    }

    fn is_fatal(&self) -> bool {
        self.fatal.lock().map(|f| f.is_some()).unwrap_or(true)
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Enqueue { item, reply } => {
                let result = self.enqueue(*item);
                let _ = reply.send(result);
                self.try_start_next();
            }
            Command::Cancel { id, reply } => {
                let _ = reply.send(self.cancel(id));
            }
            Command::Skip { id, reply } => {
                let _ = reply.send(self.skip(id));
            }
            Command::Retry { id, reply } => {
                let result = self.retry(id);
                let _ = reply.send(result);
                self.try_start_next();
            }
            Command::Start { reply } => {
                self.running = true;
                self.stop_requested = false;
                if self.run.is_none() {
                    self.begin_run();
                }
                let _ = reply.send(Ok(()));
                self.try_start_next();
            }
            Command::Stop { reply } => {
                self.stop();
                let _ = reply.send(Ok(()));
            }
            Command::ClearFinished { reply } => {
                let removed = self.queue.clear_finished();
                if removed > 0 {
                    self.emit_queue();
                }
                let _ = reply.send(Ok(removed));
                self.try_start_next();
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(Ok(self.snapshot()));
            }
            Command::Worker(message) => self.on_worker(message),
            Command::Shutdown { .. } => {}
        }
    }

    fn snapshot(&self) -> QueueSnapshot {
        self.queue.snapshot(self.active.as_ref().map(|job| job.id))
    }

    fn emit_queue(&self) {
        self.emitter.emit(InstallEvent::QueueChanged {
            snapshot: self.snapshot(),
        });
    }

    fn emit_status(&self, id: ItemId) {
        if let Some(item) = self.queue.get(id) {
            self.emitter
                .emit(InstallEvent::status(id, item.status, item.last_error.clone()));
        }
    }

    fn log(&self, text: String) {
        self.emitter.emit(InstallEvent::log(text));
    }

    fn item_name(&self, id: ItemId) -> String {
        self.queue
            .get(id)
            .map_or_else(|| id.to_string(), |item| item.name.clone())
    }

    fn begin_run(&mut self) {
        let run = RunTracker::new();
        debug!(target: "unattend.install", run_id = %run.run_id(), "Queue run started");
        self.run = Some(run);
    }

    /// Count and announce a terminal status.
    ///
    /// Works from the settled summary because a terminal backlog item may
    /// already have left the queue.
    fn report_outcome(&mut self, settled: &ItemSummary) {
        if self.run.is_none() {
            self.begin_run();
        }
        if let Some(run) = self.run.as_mut() {
            run.record(settled.id, settled.status);
        }
        self.emitter.emit(InstallEvent::status(
            settled.id,
            settled.status,
            settled.error.clone(),
        ));
    }

    /// Emit `InstallationComplete` for the current run, once.
    fn finish_run(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        let summary = run.finish();
        info!(
            target: "unattend.install",
            run_id = %summary.run_id,
            total = summary.total_items,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            skipped = summary.skipped,
            "Installation run complete"
        );
        self.emitter.emit(InstallEvent::InstallationComplete { summary });
    }

    fn enqueue(&mut self, item: InstallableItem) -> Result<ItemId, InstallError> {
        if item.status != InstallStatus::Waiting {
            return Err(InstallError::InvalidTransition {
                from: item.status,
                to: InstallStatus::Waiting,
            });
        }
        let id = item.id;
        let name = item.name.clone();
        match self.queue.push(item)? {
            Placement::Visible { evicted } => {
                if let Some(evicted) = evicted {
                    debug!(target: "unattend.install", id = %evicted, "Evicted finished item");
                }
            }
            Placement::Backlog { position } => {
                debug!(target: "unattend.install", id = %id, position, "Queued in backlog");
            }
            Placement::Dropped => {}
        }
        info!(target: "unattend.install", id = %id, name = %name, "Enqueued");
        self.emit_queue();
        Ok(id)
    }

    fn cancel(&mut self, id: ItemId) -> Result<(), InstallError> {
        if let Some(job) = self.active.as_ref().filter(|job| job.id == id) {
            // Final status is applied when the worker reports back.
            info!(target: "unattend.install", id = %id, "Cancelling active install");
            job.cancel.cancel();
            return Ok(());
        }
        let settled = self.queue.transition(id, InstallStatus::Cancelled)?;
        self.report_outcome(&settled);
        self.emit_queue();
        Ok(())
    }

    fn skip(&mut self, id: ItemId) -> Result<(), InstallError> {
        if self.active.as_ref().is_some_and(|job| job.id == id) {
            return Err(InstallError::other(format!(
                "{} is already being installed",
                self.item_name(id)
            )));
        }
        let settled = self.queue.transition(id, InstallStatus::Skipped)?;
        self.report_outcome(&settled);
        self.emit_queue();
        Ok(())
    }

    fn retry(&mut self, id: ItemId) -> Result<(), InstallError> {
        self.queue.transition(id, InstallStatus::Waiting)?;
        info!(target: "unattend.install", id = %id, "Retry requested");
        self.emit_status(id);
        self.emit_queue();
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
        match &self.active {
            Some(job) => {
                info!(target: "unattend.install", id = %job.id, "Stop requested, cancelling active install");
                self.stop_requested = true;
                job.cancel.cancel();
            }
            None => self.finish_run(),
        }
    }

    /// Start the next waiting item if the queue is running and idle.
    fn try_start_next(&mut self) {
        if !self.running
            || self.active.is_some()
            || self.root_cancel.is_cancelled()
            || self.is_fatal()
        {
            return;
        }

        let backlog_before = self.queue.backlog_len();
        let Some(id) = self.queue.next_waiting() else {
            self.finish_run();
            return;
        };
        if self.queue.backlog_len() != backlog_before {
            self.emit_queue();
        }
        let Some(item) = self.queue.get(id).cloned() else {
            return;
        };
        let Some(tx) = self.tx.upgrade() else {
            return;
        };

        if self.run.is_none() {
            self.begin_run();
        }
        self.next_lease += 1;
        let lease = LeaseId(self.next_lease);
        let cancel = self.root_cancel.child_token();
        info!(target: "unattend.install", id = %id, name = %item.name, lease = lease.0, "Starting install");
        self.log(format!("Starting {}", item.name));

        let job = InstallJob {
            lease,
            item,
            cancel: cancel.clone(),
            tx,
        };
        let handle = tokio::spawn(run_job(job, self.deps.clone()));
        self.active = Some(ActiveJob {
            lease,
            id,
            cancel,
            handle,
        });
        self.emit_queue();
    }

    fn on_worker(&mut self, message: WorkerMessage) {
        let current = self
            .active
            .as_ref()
            .is_some_and(|job| job.lease == message.lease && job.id == message.id);
        if !current {
            debug!(target: "unattend.install", id = %message.id, lease = message.lease.0, "Stale worker message");
            return;
        }

        let id = message.id;
        match message.event {
            WorkerEvent::Stage(status) => self.on_stage(id, status),
            WorkerEvent::Progress(percent) => {
                if self.queue.record_progress(id, percent) {
                    self.emitter.emit(InstallEvent::progress(id, percent));
                }
            }
            WorkerEvent::Log(text) => self.log(text),
            WorkerEvent::Finished(result) => self.on_finished(id, result),
        }
    }

    fn on_stage(&mut self, id: ItemId, status: InstallStatus) {
        if status == InstallStatus::Installing {
            let other = self
                .queue
                .items()
                .find(|item| item.id != id && item.status == InstallStatus::Installing)
                .map(|item| item.id);
            if let Some(other) = other {
                self.fail_invariant(format!(
                    "{id} entered Installing while {other} is still installing"
                ));
                return;
            }
        }

        match self.queue.transition(id, status) {
            Ok(_) => {
                debug!(target: "unattend.install", id = %id, status = %status, "Stage");
                self.emit_status(id);
                self.emit_queue();
            }
            // e.g. extraction failed and the resolver fell through to a download
            Err(e) => debug!(target: "unattend.install", id = %id, error = %e, "Stage ignored"),
        }
    }

    fn on_finished(
        &mut self,
        id: ItemId,
        result: Result<crate::executor::ExecutionReport, InstallError>,
    ) {
        self.active = None;
        let name = self.item_name(id);

        let applied = match &result {
            Ok(report) => {
                info!(target: "unattend.install", id = %id, code = report.exit_code, "Install completed");
                self.log(format!("{name} installed"));
                self.queue.transition(id, InstallStatus::Completed)
            }
            Err(InstallError::Cancelled) => {
                self.log(format!("{name} cancelled"));
                self.queue.transition(id, InstallStatus::Cancelled)
            }
            Err(e) => {
                warn!(target: "unattend.install", id = %id, error = %e, "Install failed");
                self.log(format!("{name} failed: {}", e.user_message()));
                self.queue.fail(id, e)
            }
        };
        let settled = match applied {
            Ok(settled) => Some(settled),
            Err(e) => {
                warn!(target: "unattend.install", id = %id, error = %e, "Could not apply final status");
                self.queue.fail(id, &e).ok()
            }
        };
        if let Some(settled) = settled {
            self.report_outcome(&settled);
        }
        self.queue.promote_backlog();
        self.emit_queue();

        if self.stop_requested {
            self.stop_requested = false;
            self.finish_run();
            return;
        }
        self.try_start_next();
    }

    fn fail_invariant(&mut self, message: String) {
        let err = InstallError::invariant(message);
        error!(target: "unattend.install", error = %err, "Install manager stopping");
        self.log(err.user_message());
        if let Ok(mut fatal) = self.fatal.lock() {
            *fatal = Some(err);
        }
        if let Some(job) = &self.active {
            job.cancel.cancel();
        }
    }

    /// Cancel everything, wait for the active worker and apply its result.
    async fn shutdown(&mut self) {
        self.running = false;
        self.root_cancel.cancel();

        if let Some(job) = self.active.as_mut() {
            if let Err(e) = (&mut job.handle).await {
                warn!(target: "unattend.install", error = %e, "Worker task failed");
            }
        }
        while let Ok(command) = self.rx.try_recv() {
            if let Command::Worker(message) = command {
                self.on_worker(message);
            }
        }
        // A worker that panicked never reported back.
        self.active = None;
        self.finish_run();
        info!(target: "unattend.install", "Install manager shut down");
    }
}
