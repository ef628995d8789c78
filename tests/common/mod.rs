//! Scripted evaluators for driving the orchestrator without network or engine.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chess_core::{EngineLine, EvaluatedPosition, Evaluation, Position};
use review_engine::cloud::RemoteError;
use review_engine::error::ReviewError;
use review_engine::evaluator::{DepthGauge, LocalEvaluator, RemoteEvaluator};
use review_engine::orchestrator::{Orchestrator, PoolSettings};
use review_engine::report::{Accuracies, PlayerClassifications, Report, ReportBuilder};

pub type TestOrchestrator = Orchestrator<ScriptedRemote, ScriptedLocal, StubReport>;

/// Distinct placeholder positions; the fakes never parse them.
pub fn positions(count: usize) -> Vec<Position> {
    (0..count)
        .map(|i| Position {
            fen: fen(i),
            mv: None,
        })
        .collect()
}

pub fn fen(index: usize) -> String {
    format!("8/8/8/8/8/8/8/K6k w - - 0 {}", index + 1)
}

pub fn lines(count: usize, depth: u32) -> Vec<EngineLine> {
    (1..=count)
        .map(|id| EngineLine {
            id: id as u32,
            depth,
            move_uci: "a1a2".to_string(),
            evaluation: Evaluation::Centipawns(20 - id as i32),
        })
        .collect()
}

pub fn settings(max_workers: usize) -> PoolSettings {
    PoolSettings {
        max_workers,
        worker_timeout: Duration::from_secs(5),
        max_attempts: 2,
        progress_interval: Duration::from_millis(5),
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Answers with a fixed number of lines for listed FENs and misses the rest.
#[derive(Default)]
pub struct ScriptedRemote {
    hits: HashMap<String, usize>,
    pub queried: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRemote {
    pub fn missing() -> Self {
        Self::default()
    }

    /// Hit for every position index in `indices`, with `line_count` lines.
    pub fn hits(indices: &[usize], line_count: usize) -> Self {
        Self {
            hits: indices.iter().map(|&i| (fen(i), line_count)).collect(),
            queried: Arc::default(),
        }
    }
}

impl RemoteEvaluator for ScriptedRemote {
    async fn fetch(&self, fen: &str, depth: u32) -> Result<Vec<EngineLine>, RemoteError> {
        self.queried.lock().unwrap().push(fen.to_string());
        match self.hits.get(fen) {
            Some(&count) => Ok(lines(count, depth)),
            None => Err(RemoteError::Status(404)),
        }
    }
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

/// Concurrency and attempt bookkeeping shared with the test body.
#[derive(Default)]
pub struct LocalStats {
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub started: AtomicUsize,
    pub completed: AtomicUsize,
    pub attempts: Mutex<HashMap<String, u32>>,
}

impl LocalStats {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn attempts_for(&self, fen: &str) -> u32 {
        self.attempts.lock().unwrap().get(fen).copied().unwrap_or(0)
    }
}

/// Sleeps through a fake search, raising the gauge as it goes.
pub struct ScriptedLocal {
    pub stats: Arc<LocalStats>,
    /// Time spent per depth step
    pub step: Duration,
    /// FENs whose first N attempts fail
    pub failing: HashMap<String, u32>,
    /// FENs whose first attempt never finishes
    pub hanging: HashSet<String>,
}

impl ScriptedLocal {
    pub fn new(step: Duration) -> Self {
        Self {
            stats: Arc::default(),
            step,
            failing: HashMap::new(),
            hanging: HashSet::new(),
        }
    }

    pub fn failing(mut self, index: usize, times: u32) -> Self {
        self.failing.insert(fen(index), times);
        self
    }

    pub fn hanging(mut self, index: usize) -> Self {
        self.hanging.insert(fen(index));
        self
    }
}

struct ActiveGuard<'a>(&'a LocalStats);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LocalEvaluator for ScriptedLocal {
    async fn evaluate(
        &self,
        fen: &str,
        depth: u32,
        gauge: DepthGauge,
    ) -> Result<Vec<EngineLine>, ReviewError> {
        let stats = &self.stats;
        let now = stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak.fetch_max(now, Ordering::SeqCst);
        stats.started.fetch_add(1, Ordering::SeqCst);
        let _active = ActiveGuard(stats);

        let attempt = {
            let mut attempts = stats.attempts.lock().unwrap();
            let entry = attempts.entry(fen.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        if attempt == 1 && self.hanging.contains(fen) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        for reached in 1..=depth {
            tokio::time::sleep(self.step).await;
            gauge.raise(reached);
        }

        if self.failing.get(fen).is_some_and(|&times| attempt <= times) {
            return Err(ReviewError::Stockfish("engine crashed".to_string()));
        }

        stats.completed.fetch_add(1, Ordering::SeqCst);
        Ok(lines(2, depth))
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Records what it was handed and returns an empty report.
#[derive(Default)]
pub struct StubReport {
    pub calls: Arc<Mutex<Vec<Vec<EvaluatedPosition>>>>,
    pub fail: bool,
}

impl StubReport {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl ReportBuilder for StubReport {
    fn build(&self, positions: &[EvaluatedPosition]) -> Result<Report, ReviewError> {
        self.calls.lock().unwrap().push(positions.to_vec());
        if self.fail {
            return Err(ReviewError::Report("no evaluation for final move".to_string()));
        }
        Ok(Report {
            accuracies: Accuracies {
                white: 100.0,
                black: 100.0,
            },
            classifications: PlayerClassifications::default(),
            moves: Vec::new(),
        })
    }
}
