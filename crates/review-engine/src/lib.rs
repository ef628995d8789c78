pub use chess_core;

pub mod cloud;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod saved;
pub mod stockfish;
