//! Evaluation orchestrator.
//!
//! Fills every position of a game with ranked engine lines: first a
//! sequential cloud pass over the contiguous covered prefix, then a bounded
//! pool of local workers for the rest. Workers post completions on a channel;
//! a periodic tick folds their live depth into progress. When every position
//! is filled the evaluated list is handed once to the report builder.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chess_core::{parse_game, EngineLine, EvaluatedPosition, Players, Position, SourceTag};
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cloud::{RemoteError, MIN_CLOUD_LINES};
use crate::config::validate_depth;
use crate::error::ReviewError;
use crate::evaluator::{DepthGauge, LocalEvaluator, RemoteEvaluator};
use crate::progress::{Phase, Progress, ProgressTracker};
use crate::report::{Report, ReportBuilder};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const FAILED: u8 = 2;

/// Local worker pool limits.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Maximum concurrently running local workers
    pub max_workers: usize,
    /// Time one worker attempt may take
    pub worker_timeout: Duration,
    /// Attempts per position, first one included
    pub max_attempts: u32,
    /// Progress recompute interval while workers run
    pub progress_interval: Duration,
}

impl PoolSettings {
    pub fn validate(&self) -> Result<(), ReviewError> {
        if self.max_workers == 0 {
            return Err(ReviewError::Config("worker pool needs at least one worker".into()));
        }
        if self.max_attempts == 0 {
            return Err(ReviewError::Config(
                "workers need at least one attempt per position".into(),
            ));
        }
        if self.worker_timeout.is_zero() {
            return Err(ReviewError::Config("worker timeout must be non-zero".into()));
        }
        if self.progress_interval.is_zero() {
            return Err(ReviewError::Config(
                "progress interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_workers: 8,
            worker_timeout: Duration::from_secs(120),
            max_attempts: 2,
            progress_interval: Duration::from_millis(100),
        }
    }
}

/// Lifecycle of the process-wide review slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Failed,
}

/// Result of one completed run.
#[derive(Debug, Clone)]
pub struct ReviewOutput {
    pub positions: Vec<EvaluatedPosition>,
    pub report: Report,
}

/// A reviewed PGN: header players plus the run output.
#[derive(Debug, Clone)]
pub struct GameReview {
    pub players: Players,
    pub positions: Vec<EvaluatedPosition>,
    pub report: Report,
}

/// Who is responsible for a position's lines.
enum EvaluationSource {
    Unassigned,
    Cloud,
    Local(WorkerHandle),
    LocalDone,
}

/// A running local worker. Dropping the handle aborts the worker task.
struct WorkerHandle {
    gauge: DepthGauge,
    attempt: u32,
    task: AbortHandle,
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Slot {
    position: Position,
    source: EvaluationSource,
    lines: Vec<EngineLine>,
}

impl Slot {
    fn is_filled(&self) -> bool {
        !self.lines.is_empty()
    }

    fn current_depth(&self, target: u32) -> u32 {
        match &self.source {
            EvaluationSource::Unassigned => 0,
            EvaluationSource::Cloud | EvaluationSource::LocalDone => target,
            EvaluationSource::Local(handle) => handle.gauge.get().min(target),
        }
    }
}

/// State of one run, owned by the orchestrator task. Slots are only ever
/// written here, so each has a single writer.
struct RunContext {
    slots: Vec<Slot>,
    depth: u32,
    active: usize,
}

impl RunContext {
    fn new(positions: Vec<Position>, depth: u32) -> Self {
        let slots = positions
            .into_iter()
            .map(|position| Slot {
                position,
                source: EvaluationSource::Unassigned,
                lines: Vec::new(),
            })
            .collect();
        Self {
            slots,
            depth,
            active: 0,
        }
    }

    fn all_filled(&self) -> bool {
        self.slots.iter().all(Slot::is_filled)
    }

    /// Summed search depth over the maximum possible, as a percentage.
    fn percent(&self) -> f64 {
        let total = self.slots.len() as f64 * self.depth as f64;
        if total == 0.0 {
            return 0.0;
        }
        let reached: u64 = self
            .slots
            .iter()
            .map(|slot| u64::from(slot.current_depth(self.depth)))
            .sum();
        reached as f64 / total * 100.0
    }

    fn into_evaluated(self) -> Vec<EvaluatedPosition> {
        self.slots
            .into_iter()
            .map(|slot| {
                let worker = match slot.source {
                    EvaluationSource::Cloud => SourceTag::Cloud,
                    _ => SourceTag::Local,
                };
                EvaluatedPosition {
                    fen: slot.position.fen,
                    mv: slot.position.mv,
                    worker,
                    top_lines: slot.lines,
                }
            })
            .collect()
    }
}

/// Completion posted by a worker task.
struct WorkerEvent {
    index: usize,
    attempt: u32,
    result: Result<Vec<EngineLine>, ReviewError>,
}

/// A review running in the background. `progress` was subscribed after the
/// run slot was taken, so it never carries an earlier run's values.
pub struct ReviewTask {
    pub progress: watch::Receiver<Progress>,
    pub handle: JoinHandle<Result<GameReview, ReviewError>>,
}

/// Marks the run slot as taken; releasing it without `complete` records a failure.
struct RunGuard {
    state: Arc<AtomicU8>,
    completed: bool,
}

impl RunGuard {
    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let next = if self.completed { IDLE } else { FAILED };
        self.state.store(next, Ordering::Release);
    }
}

pub struct Orchestrator<R, L, B> {
    remote: R,
    local: Arc<L>,
    builder: B,
    settings: PoolSettings,
    state: Arc<AtomicU8>,
    progress: ProgressTracker,
}

impl<R, L, B> Orchestrator<R, L, B>
where
    R: RemoteEvaluator,
    L: LocalEvaluator,
    B: ReportBuilder,
{
    pub fn new(remote: R, local: L, builder: B, settings: PoolSettings) -> Self {
        Self {
            remote,
            local: Arc::new(local),
            builder,
            settings,
            state: Arc::new(AtomicU8::new(IDLE)),
            progress: ProgressTracker::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> Progress {
        self.progress.current()
    }

    pub fn state(&self) -> RunState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => RunState::Running,
            FAILED => RunState::Failed,
            _ => RunState::Idle,
        }
    }

    /// Parse `pgn` and review the resulting game.
    pub async fn review_pgn(&self, pgn: &str, depth: u32) -> Result<GameReview, ReviewError> {
        let game = parse_game(pgn)?;
        let output = self.review(game.positions, depth).await?;
        Ok(GameReview {
            players: game.players,
            positions: output.positions,
            report: output.report,
        })
    }

    /// Evaluate every position and build the report. At most one run is
    /// active at a time; a concurrent call gets `RunInProgress` and leaves
    /// the active run untouched.
    pub async fn review(
        &self,
        positions: Vec<Position>,
        depth: u32,
    ) -> Result<ReviewOutput, ReviewError> {
        let guard = self.begin(&positions, depth)?;
        self.execute(guard, positions, depth).await
    }

    /// Validate the request and take the run slot. Nothing is touched when
    /// this fails.
    fn begin(&self, positions: &[Position], depth: u32) -> Result<RunGuard, ReviewError> {
        validate_depth(depth)?;
        self.settings.validate()?;
        if positions.is_empty() {
            return Err(ReviewError::NoPositions);
        }

        let guard = self.try_begin().ok_or(ReviewError::RunInProgress)?;
        self.progress.reset(Phase::Cloud);
        Ok(guard)
    }

    async fn execute(
        &self,
        guard: RunGuard,
        positions: Vec<Position>,
        depth: u32,
    ) -> Result<ReviewOutput, ReviewError> {
        match self.run(positions, depth).await {
            Ok(output) => {
                self.progress.set_phase(Phase::Complete);
                guard.complete();
                Ok(output)
            }
            Err(e) => {
                warn!(error = %e, "Review failed");
                self.progress.set_phase(Phase::Failed);
                Err(e)
            }
        }
    }

    fn try_begin(&self) -> Option<RunGuard> {
        [IDLE, FAILED].into_iter().find_map(|from| {
            self.state
                .compare_exchange(from, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .ok()
                .map(|_| RunGuard {
                    state: Arc::clone(&self.state),
                    completed: false,
                })
        })
    }

    async fn run(&self, positions: Vec<Position>, depth: u32) -> Result<ReviewOutput, ReviewError> {
        let mut run = RunContext::new(positions, depth);
        info!(positions = run.slots.len(), depth, "Starting evaluation");

        let from_cloud = self.cloud_pass(&mut run).await;
        info!(from_cloud, "Cloud pass finished");

        self.progress.set_phase(Phase::Local);
        self.local_pass(&mut run).await?;
        self.progress.finish_evaluation();
        info!("Evaluation complete");

        self.progress.set_phase(Phase::Reporting);
        let positions = run.into_evaluated();
        let report = self
            .builder
            .build(&positions)
            .map_err(|e| match e {
                ReviewError::Report(_) => e,
                other => ReviewError::Report(other.to_string()),
            })?;

        Ok(ReviewOutput { positions, report })
    }

    /// Cloud lookups in game order, stopping at the first miss. Returns how
    /// many positions were filled.
    async fn cloud_pass(&self, run: &mut RunContext) -> usize {
        let mut filled = 0;
        for index in 0..run.slots.len() {
            let fen = run.slots[index].position.fen.clone();
            let lines = self
                .remote
                .fetch(&fen, run.depth)
                .await
                .and_then(|lines| {
                    if lines.len() < MIN_CLOUD_LINES {
                        Err(RemoteError::InsufficientLines(lines.len()))
                    } else {
                        Ok(lines)
                    }
                });

            match lines {
                Ok(lines) => {
                    let slot = &mut run.slots[index];
                    slot.lines = lines;
                    slot.source = EvaluationSource::Cloud;
                    filled += 1;
                    self.progress.advance(run.percent());
                }
                Err(reason) => {
                    debug!(index, %reason, "Cloud coverage ended");
                    break;
                }
            }
        }
        filled
    }

    /// Dispatch unassigned positions to local workers under the pool cap
    /// until every position is filled.
    async fn local_pass(&self, run: &mut RunContext) -> Result<(), ReviewError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkerEvent>();
        let mut ticker = time::interval(self.settings.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // On error, dropping the run context aborts the remaining workers
        loop {
            if run.all_filled() {
                return Ok(());
            }

            self.dispatch(run, &tx);

            tokio::select! {
                Some(event) = rx.recv() => self.on_worker_event(run, event, &tx)?,
                _ = ticker.tick() => {}
            }

            self.progress.advance(run.percent());
        }
    }

    fn dispatch(&self, run: &mut RunContext, tx: &mpsc::UnboundedSender<WorkerEvent>) {
        let depth = run.depth;
        for index in 0..run.slots.len() {
            if run.active >= self.settings.max_workers {
                break;
            }
            let slot = &mut run.slots[index];
            if !matches!(slot.source, EvaluationSource::Unassigned) {
                continue;
            }

            let handle =
                self.spawn_worker(index, &slot.position.fen, depth, DepthGauge::new(), 1, tx);
            slot.source = EvaluationSource::Local(handle);
            run.active += 1;
            debug!(index, active = run.active, "Dispatched local worker");
        }
    }

    fn spawn_worker(
        &self,
        index: usize,
        fen: &str,
        depth: u32,
        gauge: DepthGauge,
        attempt: u32,
        tx: &mpsc::UnboundedSender<WorkerEvent>,
    ) -> WorkerHandle {
        let local = Arc::clone(&self.local);
        let fen = fen.to_string();
        let worker_gauge = gauge.clone();
        let timeout = self.settings.worker_timeout;
        let tx = tx.clone();

        let task = tokio::spawn(async move {
            let search = local.evaluate(&fen, depth, worker_gauge);
            let result = match time::timeout(timeout, search).await {
                Ok(result) => result,
                Err(_) => Err(ReviewError::WorkerTimeout(timeout)),
            };
            // Receiver is gone once the run has ended
            let _ = tx.send(WorkerEvent {
                index,
                attempt,
                result,
            });
        });

        WorkerHandle {
            gauge,
            attempt,
            task: task.abort_handle(),
        }
    }

    fn on_worker_event(
        &self,
        run: &mut RunContext,
        event: WorkerEvent,
        tx: &mpsc::UnboundedSender<WorkerEvent>,
    ) -> Result<(), ReviewError> {
        let depth = run.depth;
        let slot = &mut run.slots[event.index];
        let (gauge, attempt) = match &slot.source {
            EvaluationSource::Local(handle) if handle.attempt == event.attempt => {
                (handle.gauge.clone(), handle.attempt)
            }
            _ => return Ok(()),
        };

        let reason = match event.result {
            Ok(lines) if !lines.is_empty() => {
                slot.lines = lines;
                slot.source = EvaluationSource::LocalDone;
                run.active -= 1;
                debug!(index = event.index, active = run.active, "Local evaluation done");
                return Ok(());
            }
            Ok(_) => "engine returned no lines".to_string(),
            Err(e) => e.to_string(),
        };

        if attempt >= self.settings.max_attempts {
            return Err(ReviewError::LocalWorker {
                index: event.index,
                reason,
            });
        }

        // Same slot, fresh worker: the pool count is unchanged
        warn!(index = event.index, attempt, %reason, "Local worker failed, retrying");
        let handle =
            self.spawn_worker(event.index, &slot.position.fen, depth, gauge, attempt + 1, tx);
        slot.source = EvaluationSource::Local(handle);
        Ok(())
    }
}

impl<R, L, B> Orchestrator<R, L, B>
where
    R: RemoteEvaluator + 'static,
    L: LocalEvaluator,
    B: ReportBuilder + 'static,
{
    /// Parse `pgn`, take the run slot and review in a spawned task. Busy and
    /// invalid requests fail here, before any progress is subscribed.
    pub fn spawn_review(
        self: &Arc<Self>,
        pgn: &str,
        depth: u32,
    ) -> Result<ReviewTask, ReviewError> {
        let game = parse_game(pgn)?;
        let guard = self.begin(&game.positions, depth)?;
        let progress = self.subscribe();

        let orchestrator = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let output = orchestrator.execute(guard, game.positions, depth).await?;
            Ok::<_, ReviewError>(GameReview {
                players: game.players,
                positions: output.positions,
                report: output.report,
            })
        });

        Ok(ReviewTask { progress, handle })
    }
}
