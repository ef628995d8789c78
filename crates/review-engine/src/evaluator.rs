//! Evaluation sources the orchestrator schedules work onto.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chess_core::EngineLine;

use crate::cloud::RemoteError;
use crate::error::ReviewError;

/// Pre-computed evaluations looked up by FEN.
pub trait RemoteEvaluator: Send + Sync {
    /// Ranked lines for `fen`, or the reason none are usable.
    fn fetch(
        &self,
        fen: &str,
        depth: u32,
    ) -> impl Future<Output = Result<Vec<EngineLine>, RemoteError>> + Send;
}

/// Evaluations computed from scratch by a local engine process.
///
/// Each call is one worker: it owns its engine for the duration of the search
/// and reports the depth reached so far through `gauge`.
pub trait LocalEvaluator: Send + Sync + 'static {
    fn evaluate(
        &self,
        fen: &str,
        depth: u32,
        gauge: DepthGauge,
    ) -> impl Future<Output = Result<Vec<EngineLine>, ReviewError>> + Send;
}

/// Live search depth of one worker, readable while the search runs.
#[derive(Debug, Clone, Default)]
pub struct DepthGauge(Arc<AtomicU32>);

impl DepthGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a depth; lower values than already seen are ignored.
    pub fn raise(&self, depth: u32) {
        self.0.fetch_max(depth, Ordering::Relaxed);
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_never_decreases() {
        let gauge = DepthGauge::new();
        let observer = gauge.clone();
        gauge.raise(5);
        gauge.raise(3);
        assert_eq!(observer.get(), 5);
        gauge.raise(9);
        assert_eq!(observer.get(), 9);
    }
}
