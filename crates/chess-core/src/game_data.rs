use serde::{Deserialize, Serialize};

/// Centipawn value used when a forced mate is collapsed onto the cp scale.
const MATE_CP: i32 = 10_000;

/// One side of the board, as named in the PGN headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub rating: String,
}

impl Profile {
    pub fn new(username: impl Into<String>, rating: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            rating: rating.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    pub white: Profile,
    pub black: Profile,
}

impl Default for Players {
    fn default() -> Self {
        Self {
            white: Profile::new("White Player", "?"),
            black: Profile::new("Black Player", "?"),
        }
    }
}

/// The move that produced a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRef {
    pub san: String,
    pub uci: String,
}

/// Engine score, always from White's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Evaluation {
    #[serde(rename = "cp")]
    Centipawns(i32),
    #[serde(rename = "mate")]
    Mate(i32),
}

impl Evaluation {
    /// Flip perspective (side-to-move relative <-> White relative).
    pub fn negate(self) -> Self {
        match self {
            Self::Centipawns(cp) => Self::Centipawns(-cp),
            Self::Mate(m) => Self::Mate(-m),
        }
    }

    /// Collapse onto a single centipawn scale. Shorter mates score higher.
    /// `Mate(0)` means the side to move is already mated, so its sign comes
    /// from `white_to_move`.
    pub fn to_cp(self, white_to_move: bool) -> i32 {
        match self {
            Self::Centipawns(cp) => cp,
            Self::Mate(0) => {
                if white_to_move {
                    -MATE_CP
                } else {
                    MATE_CP
                }
            }
            Self::Mate(m) if m > 0 => MATE_CP - m,
            Self::Mate(m) => -MATE_CP - m,
        }
    }
}

/// A ranked candidate line for one position (rank 1 = best).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLine {
    pub id: u32,
    pub depth: u32,
    #[serde(rename = "moveUCI")]
    pub move_uci: String,
    pub evaluation: Evaluation,
}

/// A board state in game order, as produced by the PGN position source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub fen: String,
    #[serde(rename = "move", skip_serializing_if = "Option::is_none", default)]
    pub mv: Option<MoveRef>,
}

/// Who produced a position's lines, as handed to the report builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Cloud,
    Local,
}

/// A fully evaluated position ready for report building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedPosition {
    pub fen: String,
    #[serde(rename = "move", skip_serializing_if = "Option::is_none", default)]
    pub mv: Option<MoveRef>,
    pub worker: SourceTag,
    pub top_lines: Vec<EngineLine>,
}

impl EvaluatedPosition {
    pub fn white_to_move(&self) -> bool {
        side_to_move_is_white(&self.fen)
    }

    /// The best-ranked line, if any.
    pub fn top_line(&self) -> Option<&EngineLine> {
        self.top_lines.iter().min_by_key(|line| line.id)
    }
}

/// Second FEN field; anything other than "b" is treated as White to move.
pub fn side_to_move_is_white(fen: &str) -> bool {
    fen.split_whitespace().nth(1) != Some("b")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_json_shape() {
        let json = serde_json::to_value(Evaluation::Centipawns(35)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "cp", "value": 35}));

        let mate: Evaluation = serde_json::from_str(r#"{"type":"mate","value":-3}"#).unwrap();
        assert_eq!(mate, Evaluation::Mate(-3));
    }

    #[test]
    fn test_mate_to_cp_ordering() {
        assert!(Evaluation::Mate(1).to_cp(true) > Evaluation::Mate(5).to_cp(true));
        assert!(Evaluation::Mate(5).to_cp(true) > Evaluation::Centipawns(2000).to_cp(true));
        assert!(Evaluation::Mate(-2).to_cp(true) < Evaluation::Centipawns(-2000).to_cp(true));
        assert_eq!(Evaluation::Mate(0).to_cp(true), -MATE_CP);
        assert_eq!(Evaluation::Mate(0).to_cp(false), MATE_CP);
    }

    #[test]
    fn test_evaluated_position_field_names() {
        let pos = EvaluatedPosition {
            fen: "8/8/8/8/8/8/8/K6k w - - 0 1".to_string(),
            mv: None,
            worker: SourceTag::Cloud,
            top_lines: vec![EngineLine {
                id: 1,
                depth: 16,
                move_uci: "a1a2".to_string(),
                evaluation: Evaluation::Centipawns(0),
            }],
        };
        let json = serde_json::to_value(&pos).unwrap();
        assert_eq!(json["worker"], "cloud");
        assert_eq!(json["topLines"][0]["moveUCI"], "a1a2");
        assert!(json.get("move").is_none());
    }

    #[test]
    fn test_side_to_move() {
        assert!(side_to_move_is_white(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        ));
        assert!(!side_to_move_is_white(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        ));
    }
}
