//! Window inspection port.
//!
//! Progress is mostly read off the installer's UI: top-level windows owned by
//! a process and the child controls inside them.

use serde::{Deserialize, Serialize};

/// Class name of the standard progress-bar control.
pub const PROGRESS_BAR_CLASS: &str = "msctls_progress32";

/// A top-level window owned by a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Opaque native handle.
    pub handle: u64,
    pub title: String,
    pub class_name: String,
}

/// Position and range of a progress-bar control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRange {
    pub position: i64,
    pub min: i64,
    pub max: i64,
}

impl ProgressRange {
    /// Position as a percentage of the range. `None` for an empty range.
    pub fn percent(&self) -> Option<f64> {
        let span = self.max - self.min;
        if span <= 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let percent = (self.position - self.min) as f64 / span as f64 * 100.0;
        Some(percent)
    }
}

/// A child control of a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlInfo {
    pub class_name: String,
    pub text: String,
    /// Present for progress-bar controls.
    pub progress: Option<ProgressRange>,
}

impl ControlInfo {
    pub fn is_progress_bar(&self) -> bool {
        self.progress.is_some() || self.class_name.eq_ignore_ascii_case(PROGRESS_BAR_CLASS)
    }
}

/// Port for reading installer windows.
pub trait WindowInspectorPort: Send + Sync {
    /// Visible top-level windows owned by `pid`.
    fn windows_for_process(&self, pid: u32) -> Vec<WindowInfo>;

    /// Child controls of a window, recursively.
    fn child_controls(&self, window: &WindowInfo) -> Vec<ControlInfo>;
}

/// Inspector that sees no windows. Used where no GUI is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWindowInspector;

impl WindowInspectorPort for NoopWindowInspector {
    fn windows_for_process(&self, _pid: u32) -> Vec<WindowInfo> {
        Vec::new()
    }

    fn child_controls(&self, _window: &WindowInfo) -> Vec<ControlInfo> {
        Vec::new()
    }
}
