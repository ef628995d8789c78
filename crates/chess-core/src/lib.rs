//! Shared game model and PGN position source for game review.

pub mod game_data;
pub mod pgn;

pub use game_data::{
    EngineLine, EvaluatedPosition, Evaluation, MoveRef, Players, Position, Profile, SourceTag,
};
pub use pgn::{parse_game, ParsedGame, PgnError};
