//! PGN parsing into an ordered list of positions: regex header and movetext
//! extraction, SAN replay with shakmaty.

use std::sync::LazyLock;

use regex::Regex;
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position as _};
use thiserror::Error;

use crate::game_data::{MoveRef, Players, Position};

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).expect("header regex"));
static HEADER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("header line regex"));
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}|;[^\n]*").expect("comment regex"));
static VARIATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^()]*\)").expect("variation regex"));
static MOVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O[+#]?|O-O[+#]?")
        .expect("move regex")
});

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PgnError {
    #[error("Provide a game to analyse.")]
    Empty,

    #[error("Invalid FEN header: {0}")]
    InvalidFen(String),

    #[error("Illegal move {san} at ply {ply}")]
    IllegalMove { ply: usize, san: String },
}

/// A parsed game: the players from the headers and every position in order,
/// starting with the initial position.
#[derive(Debug, Clone)]
pub struct ParsedGame {
    pub players: Players,
    pub positions: Vec<Position>,
}

/// Parse PGN text into players and ordered positions.
pub fn parse_game(pgn: &str) -> Result<ParsedGame, PgnError> {
    if pgn.trim().is_empty() {
        return Err(PgnError::Empty);
    }

    let mut players = Players::default();
    let mut white_elo = None;
    let mut black_elo = None;
    let mut setup = false;
    let mut start_fen = None;

    for cap in HEADER_RE.captures_iter(pgn) {
        let value = cap[2].to_string();
        match &cap[1] {
            "White" if !value.is_empty() => players.white.username = value,
            "Black" if !value.is_empty() => players.black.username = value,
            "WhiteElo" if !value.is_empty() => white_elo = Some(value),
            "BlackElo" if !value.is_empty() => black_elo = Some(value),
            "SetUp" => setup = value == "1",
            "FEN" => start_fen = Some(value),
            _ => {}
        }
    }

    if let Some(rating) = white_elo {
        players.white.rating = rating;
    }
    if let Some(rating) = black_elo {
        players.black.rating = rating;
    }

    let mut pos = match start_fen {
        Some(fen) if setup => starting_position(&fen)?,
        _ => Chess::default(),
    };

    let mut positions = vec![Position {
        fen: fen_of(&pos),
        mv: None,
    }];

    for (i, san) in extract_moves(pgn).into_iter().enumerate() {
        let illegal = || PgnError::IllegalMove {
            ply: i + 1,
            san: san.clone(),
        };
        let parsed: SanPlus = san.parse().map_err(|_| illegal())?;
        let mv = parsed.san.to_move(&pos).map_err(|_| illegal())?;
        let uci = mv.to_uci(CastlingMode::Standard).to_string();

        pos.play_unchecked(mv);
        positions.push(Position {
            fen: fen_of(&pos),
            mv: Some(MoveRef { san, uci }),
        });
    }

    Ok(ParsedGame { players, positions })
}

fn starting_position(fen: &str) -> Result<Chess, PgnError> {
    let parsed: Fen = fen
        .parse()
        .map_err(|_| PgnError::InvalidFen(fen.to_string()))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|_| PgnError::InvalidFen(fen.to_string()))
}

fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Extract SAN moves from PGN text (after removing headers, comments, variations).
fn extract_moves(pgn: &str) -> Vec<String> {
    let no_headers = HEADER_LINE_RE.replace_all(pgn, "");
    let mut text = COMMENT_RE.replace_all(&no_headers, "").into_owned();

    // Innermost variations first, until nothing nested is left
    loop {
        let stripped = VARIATION_RE.replace_all(&text, "").into_owned();
        if stripped == text {
            break;
        }
        text = stripped;
    }

    MOVE_RE
        .find_iter(&text)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_data::Profile;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_parse_game_basic() {
        let pgn = r#"[White "Player1"]
[Black "Player2"]
[WhiteElo "1500"]
[Result "1-0"]

1. e4 e5 2. Nf3 Nc6 1-0"#;

        let game = parse_game(pgn).unwrap();
        assert_eq!(game.players.white, Profile::new("Player1", "1500"));
        assert_eq!(game.players.black, Profile::new("Player2", "?"));
        assert_eq!(game.positions.len(), 5);
        assert_eq!(game.positions[0].fen, START_FEN);
        assert!(game.positions[0].mv.is_none());

        let first = game.positions[1].mv.as_ref().unwrap();
        assert_eq!(first.san, "e4");
        assert_eq!(first.uci, "e2e4");
        assert_eq!(
            game.positions[1].fen,
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
    }

    #[test]
    fn test_castling_uses_king_destination() {
        let pgn = "1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. O-O Nf6";
        let game = parse_game(pgn).unwrap();
        let castle = game.positions[7].mv.as_ref().unwrap();
        assert_eq!(castle.san, "O-O");
        assert_eq!(castle.uci, "e1g1");
    }

    #[test]
    fn test_comments_and_variations_ignored() {
        let pgn = "1. e4 {best by test} (1. d4 d5 (1... Nf6)) 1... c5 ; sicilian\n2. Nf3 *";
        let game = parse_game(pgn).unwrap();
        let sans: Vec<&str> = game
            .positions
            .iter()
            .filter_map(|p| p.mv.as_ref().map(|m| m.san.as_str()))
            .collect();
        assert_eq!(sans, vec!["e4", "c5", "Nf3"]);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert_eq!(parse_game("   \n").unwrap_err(), PgnError::Empty);
    }

    #[test]
    fn test_illegal_move_reported_with_ply() {
        let err = parse_game("1. e4 e5 2. Ke3").unwrap_err();
        assert_eq!(
            err,
            PgnError::IllegalMove {
                ply: 3,
                san: "Ke3".to_string()
            }
        );
    }

    #[test]
    fn test_setup_fen_header() {
        let pgn = r#"[SetUp "1"]
[FEN "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1"]

1. e4"#;
        let game = parse_game(pgn).unwrap();
        assert_eq!(game.positions.len(), 2);
        assert_eq!(game.positions[0].fen, "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1");
    }

    #[test]
    fn test_headers_only_yields_start_position() {
        let game = parse_game("[Event \"Casual\"]\n\n*").unwrap();
        assert_eq!(game.positions.len(), 1);
    }
}
