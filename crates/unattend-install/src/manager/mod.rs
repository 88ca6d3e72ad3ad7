//! Queue orchestrator.
//!
//! # Architecture
//!
//! - **Actor**: owns the visible queue and the run tracker; the only writer
//! - **Worker**: resolves and installs one item, reports through the actor
//! - **Handle**: [`InstallManager`], a cheap clone that sends commands
//!
//! Everything goes through one unbounded channel, so handle commands and
//! worker reports are applied in arrival order and at most one worker is
//! ever alive.

mod actor;
mod run_state;
mod worker;

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};
use unattend_core::{
    InstallError, InstallEventEmitterPort, InstallableItem, ItemId, QueueSettings, QueueSnapshot,
};

use crate::executor::InstallExecutor;
use crate::queue::VisibleQueue;
use crate::resolver::AcquisitionResolver;

use actor::{Command, InstallActor};

pub use worker::WorkerDeps;

/// Dependencies for building an install manager.
pub struct InstallManagerDeps {
    /// Finds a payload for each item.
    pub resolver: AcquisitionResolver,
    /// Runs installers and watches them.
    pub executor: InstallExecutor,
    /// Port for emitting install events.
    pub event_emitter: Arc<dyn InstallEventEmitterPort>,
    pub config: QueueSettings,
}

/// Build an install manager and spawn its actor on the current runtime.
pub fn build_install_manager(deps: InstallManagerDeps) -> InstallManager {
    let (tx, rx) = mpsc::unbounded_channel();
    let fatal = Arc::new(Mutex::new(None));
    let root_cancel = CancellationToken::new();
    let actor = InstallActor::new(
        VisibleQueue::new(deps.config.max_visible),
        WorkerDeps {
            resolver: deps.resolver,
            executor: deps.executor,
        },
        deps.event_emitter,
        rx,
        tx.downgrade(),
        root_cancel.clone(),
        Arc::clone(&fatal),
    );
    tokio::spawn(actor.run());
    InstallManager {
        tx,
        fatal,
        _alive: Arc::new(root_cancel.drop_guard()),
    }
}

/// Handle to the install queue.
///
/// Dropping every handle cancels the active install; the actor exits once
/// the worker has reported back.
#[derive(Clone)]
pub struct InstallManager {
    tx: mpsc::UnboundedSender<Command>,
    fatal: Arc<Mutex<Option<InstallError>>>,
    _alive: Arc<DropGuard>,
}

impl std::fmt::Debug for InstallManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallManager")
            .field("stopped", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl InstallManager {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, InstallError>>) -> Command,
    ) -> Result<T, InstallError> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(make(reply)).is_err() {
            return Err(self.stopped_error());
        }
        rx.await.unwrap_or_else(|_| Err(self.stopped_error()))
    }

    fn stopped_error(&self) -> InstallError {
        self.fatal
            .lock()
            .ok()
            .and_then(|fatal| fatal.clone())
            .unwrap_or_else(|| InstallError::other("install manager has stopped"))
    }

    /// The error that stopped the manager, if it stopped on an invariant
    /// violation.
    pub fn fatal_error(&self) -> Option<InstallError> {
        self.fatal.lock().ok().and_then(|fatal| fatal.clone())
    }

    /// Add an item in `Waiting` state. Starts it right away if the queue is
    /// running and idle.
    pub async fn enqueue(&self, item: InstallableItem) -> Result<ItemId, InstallError> {
        self.request(|reply| Command::Enqueue {
            item: Box::new(item),
            reply,
        })
        .await
    }

    /// Cancel an item. The active item is stopped with its process tree.
    pub async fn cancel(&self, id: ItemId) -> Result<(), InstallError> {
        self.request(|reply| Command::Cancel { id, reply }).await
    }

    /// Mark a waiting item as skipped.
    pub async fn skip(&self, id: ItemId) -> Result<(), InstallError> {
        self.request(|reply| Command::Skip { id, reply }).await
    }

    /// Put a failed or cancelled item back to `Waiting`.
    pub async fn retry(&self, id: ItemId) -> Result<(), InstallError> {
        self.request(|reply| Command::Retry { id, reply }).await
    }

    /// Start processing the queue.
    pub async fn start(&self) -> Result<(), InstallError> {
        self.request(|reply| Command::Start { reply }).await
    }

    /// Stop after cancelling the active item. The run completes once the
    /// worker has returned.
    pub async fn stop(&self) -> Result<(), InstallError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Remove every finished item from the visible list.
    pub async fn clear_finished(&self) -> Result<usize, InstallError> {
        self.request(|reply| Command::ClearFinished { reply }).await
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot, InstallError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Cancel everything and wait for the actor to exit.
    pub async fn shutdown(&self) -> Result<(), InstallError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
