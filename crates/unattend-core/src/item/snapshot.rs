//! Read-only views of queue state for observers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{InstallableItem, ItemId, ItemKind};
use super::status::InstallStatus;

/// A summary of an item in the visible queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    pub status: InstallStatus,
    /// Progress percentage (0 - 100).
    pub progress: u8,
    /// Error message if status is Failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&InstallableItem> for ItemSummary {
    fn from(item: &InstallableItem) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            kind: item.kind,
            status: item.status,
            progress: item.progress,
            error: item.last_error.clone(),
        }
    }
}

/// Snapshot of the visible queue plus the size of the hidden backlog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Visible items, in display order.
    pub items: Vec<ItemSummary>,
    /// Capacity of the visible list.
    pub max_visible: u32,
    /// Waiting items not yet promoted into the visible list.
    pub backlog_count: u32,
    /// Item currently owned by the worker, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<ItemId>,
}

impl QueueSnapshot {
    /// Look up a visible item by ID.
    pub fn get(&self, id: ItemId) -> Option<&ItemSummary> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Number of visible items with the given status.
    pub fn count(&self, status: InstallStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }
}

/// Outcome counts for one queue run (busy → drained, or until `stop()`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total_items: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub cancelled: u32,
    pub skipped: u32,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
}

impl RunSummary {
    /// Duration of the run in milliseconds.
    pub const fn duration_ms(&self) -> u64 {
        self.finished_at_ms.saturating_sub(self.started_at_ms)
    }

    /// Whether every item in the run succeeded.
    pub const fn all_succeeded(&self) -> bool {
        self.succeeded == self.total_items
    }
}
