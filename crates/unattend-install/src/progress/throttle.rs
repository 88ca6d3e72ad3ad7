//! Download log throttle.
//!
//! Byte progress arrives once per network chunk. Observers only need a log
//! line every few seconds, on each 10% step, and when the download ends.

use std::time::Duration;

use tokio::time::Instant;
use unattend_core::DownloadProgress;

/// Percentage steps that always produce a line.
const STEP_PERCENT: u8 = 10;

/// Decides which download samples become log lines.
#[derive(Debug)]
pub struct ProgressThrottle {
    min_interval: Duration,
    last_emit: Option<Instant>,
    last_step: Option<u8>,
    last_bytes: u64,
    finished: bool,
}

impl ProgressThrottle {
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: None,
            last_step: None,
            last_bytes: 0,
            finished: false,
        }
    }

    /// Whether `progress` deserves a log line.
    ///
    /// The first sample and the first complete one always pass. With a known
    /// total, crossing into a new 10% step passes. Otherwise a sample passes
    /// once `min_interval` has elapsed and the byte count moved.
    pub fn admit(&mut self, progress: DownloadProgress) -> bool {
        if self.finished {
            return false;
        }
        let now = Instant::now();
        let percent = progress.percent();
        let step = percent.map(|p| p / STEP_PERCENT);

        let pass = match (self.last_emit, percent) {
            (None, _) => true,
            (_, Some(100)) => true,
            (Some(last), _) => {
                step > self.last_step
                    || (now.duration_since(last) >= self.min_interval
                        && progress.downloaded > self.last_bytes)
            }
        };
        if pass {
            self.last_emit = Some(now);
            self.last_step = step;
            self.last_bytes = progress.downloaded;
            self.finished = percent == Some(100);
        }
        pass
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(downloaded: u64, total: Option<u64>) -> DownloadProgress {
        DownloadProgress { downloaded, total }
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_and_completion_pass() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(60));
        let passed: Vec<u64> = [1, 5, 9, 10, 14, 25, 26, 99, 100, 100]
            .into_iter()
            .filter(|done| throttle.admit(sample(*done, Some(100))))
            .collect();
        // The first sample, each new 10% step, then completion once.
        assert_eq!(passed, vec![1, 10, 25, 99, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_total_uses_interval() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(500));
        assert!(throttle.admit(sample(1_000, None)));
        assert!(!throttle.admit(sample(2_000, None)));

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(!throttle.admit(sample(1_000, None)));
        assert!(throttle.admit(sample(3_000, None)));
    }
}
