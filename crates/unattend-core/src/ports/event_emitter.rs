//! Install event emitter port.
//!
//! The orchestrator emits [`InstallEvent`]s without knowing who listens:
//! a terminal renderer, a GUI bridge, a test recorder.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::events::InstallEvent;

/// Broadcast channel capacity for install events.
const CHANNEL_CAPACITY: usize = 256;

/// Port for emitting install events.
///
/// Implementations must not block: the orchestrator calls `emit` from its
/// single-writer loop.
pub trait InstallEventEmitterPort: Send + Sync {
    /// Emit an install event.
    fn emit(&self, event: InstallEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn InstallEventEmitterPort>;
}

/// A no-op emitter for tests and contexts without observers.
#[derive(Debug, Clone, Default)]
pub struct NoopInstallEmitter;

impl NoopInstallEmitter {
    /// Create a new no-op emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl InstallEventEmitterPort for NoopInstallEmitter {
    fn emit(&self, _event: InstallEvent) {
        // Intentionally do nothing
    }

    fn clone_box(&self) -> Box<dyn InstallEventEmitterPort> {
        Box::new(self.clone())
    }
}

type Listener = Arc<dyn Fn(&InstallEvent) + Send + Sync>;

/// Fan-out emitter: tokio broadcast subscribers plus registered callbacks.
///
/// Subscribers that fall behind lose the oldest events (`RecvError::Lagged`);
/// callbacks run synchronously on the emitting task and must stay cheap.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<InstallEvent>,
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl EventBroadcaster {
    /// Create a new broadcaster.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe to install events.
    pub fn subscribe(&self) -> broadcast::Receiver<InstallEvent> {
        self.sender.subscribe()
    }

    /// Register a callback invoked for every event.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&InstallEvent) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Number of channel subscribers plus registered callbacks.
    pub fn observer_count(&self) -> usize {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        self.sender.receiver_count() + listeners
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscribers", &self.sender.receiver_count())
            .finish_non_exhaustive()
    }
}

impl InstallEventEmitterPort for EventBroadcaster {
    fn emit(&self, event: InstallEvent) {
        // Snapshot the callbacks so a listener can register another one.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            listener(&event);
        }

        if self.sender.receiver_count() > 0 {
            let _ = self.sender.send(event);
        }
    }

    fn clone_box(&self) -> Box<dyn InstallEventEmitterPort> {
        Box::new(self.clone())
    }
}
