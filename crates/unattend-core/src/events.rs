//! Install events - discriminated union for everything observers can see.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "progress_changed", "id": 3, "percent": 42 }
//! ```

use serde::{Deserialize, Serialize};

use crate::item::{InstallStatus, ItemId, QueueSnapshot, RunSummary};

/// Single discriminated union for all install events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallEvent {
    /// Progress of the installing item moved forward.
    ProgressChanged {
        id: ItemId,
        percent: u8,
    },

    /// An item changed status.
    StatusChanged {
        id: ItemId,
        status: InstallStatus,
        /// Error message when the new status is `Failed`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Human-readable log line.
    LogMessage {
        text: String,
    },

    /// The visible queue changed shape.
    QueueChanged {
        snapshot: QueueSnapshot,
    },

    /// A queue run finished.
    InstallationComplete {
        summary: RunSummary,
    },
}

impl InstallEvent {
    /// Create a progress event.
    pub const fn progress(id: ItemId, percent: u8) -> Self {
        Self::ProgressChanged { id, percent }
    }

    /// Create a status event.
    pub const fn status(id: ItemId, status: InstallStatus, error: Option<String>) -> Self {
        Self::StatusChanged { id, status, error }
    }

    /// Create a log event.
    pub fn log(text: impl Into<String>) -> Self {
        Self::LogMessage { text: text.into() }
    }

    /// ID of the item this event is about, if any.
    pub const fn item_id(&self) -> Option<ItemId> {
        match self {
            Self::ProgressChanged { id, .. } | Self::StatusChanged { id, .. } => Some(*id),
            _ => None,
        }
    }
}
