//! Queue run tracking (busy → drained, or until `stop()`).

use chrono::Utc;
use unattend_core::{InstallStatus, ItemId, RunSummary};
use uuid::Uuid;

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Outcome counters for one run.
#[derive(Debug)]
pub(crate) struct RunTracker {
    run_id: Uuid,
    started_at_ms: u64,
    finished: Vec<(ItemId, InstallStatus)>,
}

impl RunTracker {
    pub(crate) fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at_ms: now_ms(),
            finished: Vec::new(),
        }
    }

    pub(crate) const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Record a terminal status. Non-terminal statuses are ignored.
    pub(crate) fn record(&mut self, id: ItemId, status: InstallStatus) {
        if !status.is_terminal() {
            return;
        }
        // A retried item counts once, with its latest outcome.
        self.finished.retain(|(seen, _)| *seen != id);
        self.finished.push((id, status));
    }

    fn count(&self, status: InstallStatus) -> u32 {
        let n = self.finished.iter().filter(|(_, s)| *s == status).count();
        u32::try_from(n).unwrap_or(u32::MAX)
    }

    pub(crate) fn finish(self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            total_items: u32::try_from(self.finished.len()).unwrap_or(u32::MAX),
            succeeded: self.count(InstallStatus::Completed),
            failed: self.count(InstallStatus::Failed),
            cancelled: self.count(InstallStatus::Cancelled),
            skipped: self.count(InstallStatus::Skipped),
            started_at_ms: self.started_at_ms,
            finished_at_ms: now_ms(),
        }
    }
}
