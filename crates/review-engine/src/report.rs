//! Move classification and accuracy report built from evaluated positions.
//! Pure functions plus the `ReportBuilder` seam the orchestrator hands off to.

use chess_core::EvaluatedPosition;
use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Position};

use crate::error::ReviewError;

/// Classification thresholds (centipawn loss)
const THRESHOLD_BEST: i32 = 0;
const THRESHOLD_EXCELLENT: i32 = 10;
const THRESHOLD_GOOD: i32 = 50;
const THRESHOLD_INACCURACY: i32 = 100;
const THRESHOLD_MISTAKE: i32 = 200;

/// Mate detection threshold
const MATE_THRESHOLD: i32 = 9000;

/// Maximum CP loss to cap at
const MAX_CP_LOSS: i32 = 500;

/// Consumes a fully evaluated game exactly once.
pub trait ReportBuilder: Send + Sync {
    fn build(&self, positions: &[EvaluatedPosition]) -> Result<Report, ReviewError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Forced,
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveAnalysis {
    pub san: String,
    #[serde(rename = "move")]
    pub move_uci: String,
    pub move_eval: i32,
    pub best_move: String,
    pub best_eval: i32,
    pub cp_loss: i32,
    pub classification: Classification,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifications {
    pub forced: u32,
    pub best: u32,
    pub excellent: u32,
    pub good: u32,
    pub inaccuracy: u32,
    pub mistake: u32,
    pub blunder: u32,
}

impl Classifications {
    fn count(&mut self, classification: Classification) {
        let slot = match classification {
            Classification::Forced => &mut self.forced,
            Classification::Best => &mut self.best,
            Classification::Excellent => &mut self.excellent,
            Classification::Good => &mut self.good,
            Classification::Inaccuracy => &mut self.inaccuracy,
            Classification::Mistake => &mut self.mistake,
            Classification::Blunder => &mut self.blunder,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accuracies {
    pub white: f64,
    pub black: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerClassifications {
    pub white: Classifications,
    pub black: Classifications,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub accuracies: Accuracies,
    pub classifications: PlayerClassifications,
    pub moves: Vec<MoveAnalysis>,
}

/// Centipawn-loss based classification and accuracy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccuracyReportBuilder;

impl ReportBuilder for AccuracyReportBuilder {
    fn build(&self, positions: &[EvaluatedPosition]) -> Result<Report, ReviewError> {
        if positions.is_empty() {
            return Err(ReviewError::Report("no positions".into()));
        }

        let mut moves = Vec::with_capacity(positions.len() - 1);
        let mut classifications = PlayerClassifications::default();
        let (mut white_loss, mut white_moves) = (0, 0u32);
        let (mut black_loss, mut black_moves) = (0, 0u32);

        for (i, pair) in positions.windows(2).enumerate() {
            let (before, after) = (&pair[0], &pair[1]);
            let played = after
                .mv
                .as_ref()
                .ok_or_else(|| ReviewError::Report(format!("position {} has no move", i + 1)))?;
            let best_line = before
                .top_line()
                .ok_or_else(|| ReviewError::Report(format!("position {i} has no evaluation")))?;
            let after_line = after.top_line().ok_or_else(|| {
                ReviewError::Report(format!("position {} has no evaluation", i + 1))
            })?;

            let is_white = before.white_to_move();
            let best_eval = best_line.evaluation.to_cp(is_white);
            let move_eval = after_line.evaluation.to_cp(after.white_to_move());
            let is_checkmate = after_line.move_uci.is_empty() && move_eval.abs() > MATE_THRESHOLD;

            let cp_loss = if played.uci == best_line.move_uci {
                0
            } else {
                calculate_cp_loss(best_eval, move_eval, is_white, is_checkmate)
            };
            let mate_blunder = played.uci != best_line.move_uci
                && is_mate_blunder(best_eval, move_eval, is_white, is_checkmate);

            let classification = if legal_move_count(&before.fen) == Some(1) {
                Classification::Forced
            } else {
                classify_move(cp_loss, mate_blunder)
            };

            if is_white {
                white_loss += cp_loss;
                white_moves += 1;
                classifications.white.count(classification);
            } else {
                black_loss += cp_loss;
                black_moves += 1;
                classifications.black.count(classification);
            }

            moves.push(MoveAnalysis {
                san: played.san.clone(),
                move_uci: played.uci.clone(),
                move_eval,
                best_move: best_line.move_uci.clone(),
                best_eval,
                cp_loss,
                classification,
            });
        }

        Ok(Report {
            accuracies: Accuracies {
                white: calculate_accuracy(white_loss, white_moves),
                black: calculate_accuracy(black_loss, black_moves),
            },
            classifications,
            moves,
        })
    }
}

fn legal_move_count(fen: &str) -> Option<usize> {
    let fen: Fen = fen.parse().ok()?;
    let pos: Chess = fen.into_position(CastlingMode::Standard).ok()?;
    Some(pos.legal_moves().len())
}

fn is_mate_position(eval: i32) -> bool {
    eval.abs() > MATE_THRESHOLD
}

pub fn is_mate_blunder(
    best_eval: i32,
    after_eval: i32,
    is_white: bool,
    is_checkmate: bool,
) -> bool {
    if is_checkmate {
        return false;
    }

    let best_is_mate = is_mate_position(best_eval);
    let after_is_mate = is_mate_position(after_eval);

    if best_is_mate && !after_is_mate {
        // Only a blunder if the missed mate was ours
        return if is_white { best_eval > 0 } else { best_eval < 0 };
    }

    if !best_is_mate && after_is_mate {
        let allowed_bad_mate = if is_white {
            after_eval < 0
        } else {
            after_eval > 0
        };
        return allowed_bad_mate;
    }

    false
}

pub fn calculate_cp_loss(
    best_eval: i32,
    after_eval: i32,
    is_white: bool,
    is_checkmate: bool,
) -> i32 {
    if is_checkmate {
        return 0;
    }

    let best_is_mate = is_mate_position(best_eval);
    let after_is_mate = is_mate_position(after_eval);

    if best_is_mate && after_is_mate {
        if (best_eval > 0) == (after_eval > 0) {
            return 0;
        } else {
            return MAX_CP_LOSS;
        }
    }

    let cp_loss = if is_white {
        best_eval - after_eval
    } else {
        after_eval - best_eval
    };

    cp_loss.clamp(0, MAX_CP_LOSS)
}

pub fn classify_move(cp_loss: i32, is_mate_blunder: bool) -> Classification {
    if is_mate_blunder {
        return Classification::Blunder;
    }
    if cp_loss <= THRESHOLD_BEST {
        Classification::Best
    } else if cp_loss < THRESHOLD_EXCELLENT {
        Classification::Excellent
    } else if cp_loss < THRESHOLD_GOOD {
        Classification::Good
    } else if cp_loss < THRESHOLD_INACCURACY {
        Classification::Inaccuracy
    } else if cp_loss < THRESHOLD_MISTAKE {
        Classification::Mistake
    } else {
        Classification::Blunder
    }
}

pub fn calculate_accuracy(total_cp_loss: i32, move_count: u32) -> f64 {
    if move_count == 0 {
        return 100.0;
    }
    let acpl = total_cp_loss as f64 / move_count as f64;
    let accuracy = 100.0 * (1.0 / (1.0 + acpl / 100.0)).sqrt();
    accuracy.clamp(0.0, 100.0)
}
