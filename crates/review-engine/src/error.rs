//! Review error types

use std::time::Duration;

use chess_core::PgnError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse PGN: {0}")]
    Pgn(#[from] PgnError),

    #[error("Search depth must be between {min} and {max}, got {depth}")]
    InvalidDepth { depth: u32, min: u32, max: u32 },

    #[error("No positions to evaluate")]
    NoPositions,

    #[error("An analysis is already running")]
    RunInProgress,

    #[error("Stockfish error: {0}")]
    Stockfish(String),

    #[error("Engine did not finish within {0:?}")]
    WorkerTimeout(Duration),

    #[error("Local evaluation failed for position {index}: {reason}")]
    LocalWorker { index: usize, reason: String },

    #[error("Failed to generate report: {0}")]
    Report(String),

    #[error("Invalid savefile: {0}")]
    InvalidSavefile(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
