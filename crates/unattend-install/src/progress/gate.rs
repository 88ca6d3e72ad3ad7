//! Monotonic progress gate.

/// Passes a percentage only if it is strictly greater than the last one.
///
/// Heuristic detectors disagree with each other from tick to tick; the gate
/// is what keeps the reported value from ever moving backwards.
#[derive(Debug, Default, Clone)]
pub struct ProgressGate {
    last: Option<u8>,
}

impl ProgressGate {
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Admit a raw sample. Non-finite values are dropped, the rest rounded
    /// down and clamped to `[0, 100]`.
    pub fn admit(&mut self, raw: f64) -> Option<u8> {
        if !raw.is_finite() {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = raw.clamp(0.0, 100.0).floor() as u8;
        if self.last.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }

    pub const fn last(&self) -> Option<u8> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_strictly_increasing_values_pass() {
        let mut gate = ProgressGate::new();
        let samples = [5.0, 5.4, 3.0, 12.9, 12.0, 150.0, 99.0, 100.0];
        let passed: Vec<u8> = samples.iter().filter_map(|s| gate.admit(*s)).collect();
        assert_eq!(passed, vec![5, 12, 100]);
    }

    #[test]
    fn test_non_finite_and_negative() {
        let mut gate = ProgressGate::new();
        assert_eq!(gate.admit(f64::NAN), None);
        assert_eq!(gate.admit(f64::INFINITY), None);
        assert_eq!(gate.admit(-4.0), Some(0));
        assert_eq!(gate.last(), Some(0));
    }
}
