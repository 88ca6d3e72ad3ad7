//! Auxiliary-process watch.
//!
//! Repacks unpack through an extraction helper (`unarc`, `isdone`) and some
//! leave an unwanted helper behind at the end (`quicksfv`). Phase 1 waits for
//! the extraction helper; without one there is nothing to do. Phase 2 waits
//! for the unwanted helper and, once it shows up, terminates both: the
//! extraction helper first, then the unwanted one after a short gap.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use unattend_core::{
    AuxiliaryWatchSettings, InstallError, ProcessInfo, ProcessTablePort, find_process,
};

/// Liveness poll while waiting for a graceful close.
const CLOSE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuxiliaryOutcome {
    /// No extraction helper appeared within phase 1.
    NoExtractor,
    /// The extraction helper ran but no unwanted helper appeared.
    NoUnwanted,
    /// Cleanup ran; PIDs that are confirmed gone.
    Cleaned { terminated: Vec<u32> },
    /// The session ended before cleanup started.
    Cancelled,
}

enum Wait {
    Found(ProcessInfo),
    TimedOut,
    Cancelled,
}

pub struct AuxiliaryWatch {
    table: Arc<dyn ProcessTablePort>,
    settings: AuxiliaryWatchSettings,
}

impl AuxiliaryWatch {
    pub fn new(table: Arc<dyn ProcessTablePort>, settings: AuxiliaryWatchSettings) -> Self {
        Self { table, settings }
    }

    /// Run both phases. Cleanup, once started, ignores `cancel`.
    pub async fn run(&self, cancel: &CancellationToken) -> AuxiliaryOutcome {
        let extractor = match self
            .wait_for(&self.settings.extraction_helpers, self.settings.phase1_timeout(), cancel)
            .await
        {
            Wait::Found(process) => process,
            Wait::TimedOut => return AuxiliaryOutcome::NoExtractor,
            Wait::Cancelled => return AuxiliaryOutcome::Cancelled,
        };
        debug!(target: "unattend.monitor", pid = extractor.pid, name = %extractor.name, "Extraction helper running");

        let unwanted = match self
            .wait_for(&self.settings.unwanted_helpers, self.settings.phase2_timeout(), cancel)
            .await
        {
            Wait::Found(process) => process,
            Wait::TimedOut => return AuxiliaryOutcome::NoUnwanted,
            Wait::Cancelled => return AuxiliaryOutcome::Cancelled,
        };
        info!(
            target: "unattend.monitor",
            extractor = %extractor.name,
            unwanted = %unwanted.name,
            "Unwanted helper detected, cleaning up"
        );

        let mut terminated = Vec::new();
        for (index, process) in [extractor, unwanted].into_iter().enumerate() {
            if index > 0 {
                sleep(self.settings.cleanup_gap()).await;
            }
            match self.terminate(process.pid).await {
                Ok(()) => terminated.push(process.pid),
                Err(e) => {
                    warn!(target: "unattend.monitor", pid = process.pid, error = %e, "Helper cleanup failed");
                }
            }
        }
        AuxiliaryOutcome::Cleaned { terminated }
    }

    async fn wait_for(&self, names: &[String], timeout: Duration, cancel: &CancellationToken) -> Wait {
        if names.is_empty() {
            return Wait::TimedOut;
        }
        let deadline = Instant::now() + timeout;
        let mut ticker = interval(self.settings.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Wait::Cancelled,
                _ = ticker.tick() => {}
            }
            if let Some(process) = find_process(&self.table.snapshot(), names) {
                return Wait::Found(process.clone());
            }
            if Instant::now() >= deadline {
                return Wait::TimedOut;
            }
        }
    }

    /// Ask `pid` to close, wait up to the graceful window, then kill it.
    pub async fn terminate(&self, pid: u32) -> Result<(), InstallError> {
        if let Err(e) = self.table.request_close(pid) {
            debug!(target: "unattend.monitor", pid, error = %e, "Close request refused");
        }

        let deadline = Instant::now() + self.settings.graceful_wait();
        while Instant::now() < deadline {
            if !self.table.is_alive(pid) {
                return Ok(());
            }
            sleep(CLOSE_POLL).await;
        }
        if !self.table.is_alive(pid) {
            return Ok(());
        }

        debug!(target: "unattend.monitor", pid, "Graceful close timed out, killing");
        self.table
            .kill(pid)
            .map_err(|e| InstallError::cleanup_failed(format!("pid {pid}: {e}")))
    }
}
