//! Progress bars for a queue run.

use std::collections::HashMap;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use unattend_core::{InstallEvent, InstallStatus, ItemId, RunSummary};

const BAR_TEMPLATE: &str = "{prefix:.bold} [{bar:30.cyan/blue}] {pos:>3}% {msg}";

/// One bar per item, driven by install events.
pub struct RunProgress {
    multi: MultiProgress,
    bars: HashMap<ItemId, ProgressBar>,
    style: ProgressStyle,
}

impl RunProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            style,
        }
    }

    /// Add a bar for an enqueued item.
    pub fn add(&mut self, id: ItemId, name: &str) {
        let bar = self.multi.add(ProgressBar::new(100));
        bar.set_style(self.style.clone());
        bar.set_prefix(name.to_string());
        bar.set_message(InstallStatus::Waiting.to_string());
        self.bars.insert(id, bar);
    }

    /// Apply one event. Returns the summary when the run has finished.
    pub fn apply(&self, event: &InstallEvent) -> Option<RunSummary> {
        match event {
            InstallEvent::ProgressChanged { id, percent } => {
                if let Some(bar) = self.bars.get(id) {
                    bar.set_position(u64::from(*percent));
                }
            }
            InstallEvent::StatusChanged { id, status, error } => {
                if let Some(bar) = self.bars.get(id) {
                    let message = match error {
                        Some(error) => format!("{status}: {error}"),
                        None => status.to_string(),
                    };
                    if *status == InstallStatus::Completed {
                        bar.set_position(100);
                    }
                    if status.is_terminal() {
                        bar.finish_with_message(message);
                    } else {
                        bar.set_message(message);
                    }
                }
            }
            InstallEvent::LogMessage { text } => {
                let _ = self.multi.println(text);
            }
            InstallEvent::QueueChanged { .. } => {}
            InstallEvent::InstallationComplete { summary } => return Some(summary.clone()),
        }
        None
    }

    /// Print a line above the bars.
    pub fn println(&self, line: &str) {
        let _ = self.multi.println(line);
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_summary(summary: &RunSummary) -> String {
    let seconds = summary.duration_ms() / 1000;
    format!(
        "{} item(s) in {seconds}s: {} installed, {} failed, {} cancelled, {} skipped",
        summary.total_items, summary.succeeded, summary.failed, summary.cancelled, summary.skipped
    )
}
