//! Progress inspector port: one heuristic for reading installer progress.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use super::process_table::ProcessTablePort;
use super::window_inspector::{WindowInfo, WindowInspectorPort};

/// Everything a detector may look at during one poll tick.
pub struct ProgressContext<'a> {
    /// Root process of the installer.
    pub pid: u32,
    /// Time since the installer was launched.
    pub elapsed: Duration,
    /// Wall-clock launch time, for temp-file age checks.
    pub started_at: SystemTime,
    /// Top-level windows of the root process and its descendants, read once
    /// per tick.
    pub windows: &'a [WindowInfo],
    pub window_inspector: &'a dyn WindowInspectorPort,
    pub process_table: &'a dyn ProcessTablePort,
    /// Directory scanned for growing temp files.
    pub temp_dir: PathBuf,
}

/// One progress heuristic.
///
/// Returns a raw percentage; the monitor discards non-finite values and
/// clamps the rest to `[0, 100]`. Errors are the detector's business: return
/// `None` and let the next detector try.
pub trait ProgressInspector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Inspect the installer and return a percentage if one is observable.
    fn inspect(&self, ctx: &ProgressContext<'_>) -> Option<f64>;
}
