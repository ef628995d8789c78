//! Saved analysis files: players plus a finished report, replayed without
//! re-evaluating anything.

use chess_core::Players;
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;
use crate::orchestrator::GameReview;
use crate::report::Report;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedAnalysis {
    pub players: Players,
    pub results: Report,
}

impl SavedAnalysis {
    pub fn to_json_pretty(&self) -> Result<String, ReviewError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<GameReview> for SavedAnalysis {
    fn from(review: GameReview) -> Self {
        Self {
            players: review.players,
            results: review.report,
        }
    }
}

/// Parse a saved analysis.
pub fn load_saved(text: &str) -> Result<SavedAnalysis, ReviewError> {
    serde_json::from_str(text).map_err(|e| ReviewError::InvalidSavefile(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Accuracies, PlayerClassifications};

    #[test]
    fn test_load_saved_file() {
        let text = r#"{
            "players": {
                "white": {"username": "White Player", "rating": "0"},
                "black": {"username": "Black Player", "rating": "0"}
            },
            "results": {
                "accuracies": {"white": 91.5, "black": 78.25},
                "classifications": {
                    "white": {"forced":0,"best":3,"excellent":1,"good":0,"inaccuracy":0,"mistake":0,"blunder":0},
                    "black": {"forced":0,"best":1,"excellent":0,"good":1,"inaccuracy":1,"mistake":0,"blunder":1}
                },
                "moves": []
            }
        }"#;

        let saved = load_saved(text).unwrap();
        assert_eq!(saved.players.white.username, "White Player");
        assert_eq!(saved.results.accuracies.black, 78.25);
        assert_eq!(saved.results.classifications.black.blunder, 1);
    }

    #[test]
    fn test_invalid_savefile() {
        assert!(matches!(
            load_saved(r#"{"players": {}}"#),
            Err(ReviewError::InvalidSavefile(_))
        ));
        assert!(matches!(
            load_saved("1. e4 e5"),
            Err(ReviewError::InvalidSavefile(_))
        ));
    }

    #[test]
    fn test_written_file_loads_back() {
        let saved = SavedAnalysis {
            players: Players::default(),
            results: Report {
                accuracies: Accuracies {
                    white: 100.0,
                    black: 100.0,
                },
                classifications: PlayerClassifications::default(),
                moves: vec![],
            },
        };
        let json = saved.to_json_pretty().unwrap();
        assert_eq!(load_saved(&json).unwrap(), saved);
    }
}
