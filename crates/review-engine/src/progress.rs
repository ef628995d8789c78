//! Live review progress, published on a watch channel.

use serde::Serialize;
use tokio::sync::watch;

/// Highest percentage reported while any position is still unfilled.
const MAX_IN_FLIGHT_PERCENT: f64 = 99.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Cloud,
    Local,
    Reporting,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub phase: Phase,
    pub percent: f64,
}

impl Progress {
    const IDLE: Progress = Progress {
        phase: Phase::Idle,
        percent: 0.0,
    };
}

/// Owns the progress value for the current run. Percent only moves forward
/// until the next `reset`.
#[derive(Debug)]
pub struct ProgressTracker {
    tx: watch::Sender<Progress>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Progress::IDLE);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Progress {
        *self.tx.borrow()
    }

    /// Start of a new run.
    pub fn reset(&self, phase: Phase) {
        self.tx.send_replace(Progress {
            phase,
            percent: 0.0,
        });
    }

    pub fn set_phase(&self, phase: Phase) {
        self.tx.send_if_modified(|p| {
            let changed = p.phase != phase;
            p.phase = phase;
            changed
        });
    }

    /// Raise the percentage; values below the current one are ignored.
    pub fn advance(&self, percent: f64) {
        let percent = percent.clamp(0.0, MAX_IN_FLIGHT_PERCENT);
        self.tx.send_if_modified(|p| {
            if percent > p.percent {
                p.percent = percent;
                true
            } else {
                false
            }
        });
    }

    /// Every position is filled.
    pub fn finish_evaluation(&self) {
        self.tx.send_if_modified(|p| {
            let changed = p.percent < 100.0;
            p.percent = 100.0;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_is_monotonic() {
        let tracker = ProgressTracker::new();
        tracker.reset(Phase::Cloud);
        tracker.advance(40.0);
        tracker.advance(25.0);
        assert_eq!(tracker.current().percent, 40.0);
    }

    #[test]
    fn test_only_finish_reaches_hundred() {
        let tracker = ProgressTracker::new();
        tracker.reset(Phase::Local);
        tracker.advance(100.0);
        assert!(tracker.current().percent < 100.0);
        tracker.finish_evaluation();
        assert_eq!(tracker.current().percent, 100.0);
    }

    #[test]
    fn test_reset_starts_over() {
        let tracker = ProgressTracker::new();
        let rx = tracker.subscribe();
        tracker.advance(80.0);
        tracker.reset(Phase::Cloud);
        assert_eq!(
            *rx.borrow(),
            Progress {
                phase: Phase::Cloud,
                percent: 0.0
            }
        );
    }
}
