//! Stockfish engine wrapper using UCI protocol (async I/O)

use chess_core::game_data::side_to_move_is_white;
use chess_core::{EngineLine, Evaluation};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::error::ReviewError;
use crate::evaluator::{DepthGauge, LocalEvaluator};

/// Candidate lines searched per position.
const MULTI_PV: u32 = 2;

/// Best line seen so far for one multipv slot (score relative to side to move).
#[derive(Debug, Clone)]
struct PvSlot {
    depth: u32,
    first_move: String,
    score: Evaluation,
}

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(path: &str, hash_mb: u32) -> Result<Self, ReviewError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReviewError::Stockfish(format!("Failed to spawn Stockfish: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| ReviewError::Stockfish("Stockfish stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| ReviewError::Stockfish("Stockfish stdout unavailable".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout,
        };

        // Initialize UCI
        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        // Configure for analysis
        engine.send("setoption name Threads value 1").await?;
        engine
            .send(&format!("setoption name Hash value {hash_mb}"))
            .await?;
        engine
            .send(&format!("setoption name MultiPV value {MULTI_PV}"))
            .await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), ReviewError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| ReviewError::Stockfish(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| ReviewError::Stockfish(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    /// Read one line; EOF means the process died.
    async fn read_line(&mut self, line: &mut String) -> Result<(), ReviewError> {
        line.clear();
        let read = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| ReviewError::Stockfish(format!("Failed to read from Stockfish: {e}")))?;
        if read == 0 {
            return Err(ReviewError::Stockfish("Stockfish exited unexpectedly".into()));
        }
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), ReviewError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();
            debug!(line = trimmed, "SF >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Search `fen` to `depth` and return the ranked lines from White's
    /// point of view. Depth reached so far is published on `gauge`.
    pub async fn evaluate(
        &mut self,
        fen: &str,
        depth: u32,
        gauge: &DepthGauge,
    ) -> Result<Vec<EngineLine>, ReviewError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut slots: Vec<Option<PvSlot>> = vec![None; MULTI_PV as usize];
        // Score reported without a pv (no legal moves)
        let mut terminal_score: Option<Evaluation> = None;
        let mut line = String::new();

        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();

            if trimmed.starts_with("info") {
                let info_depth = parse_depth(trimmed);
                if let Some(d) = info_depth {
                    gauge.raise(d);
                }

                let score = parse_score(trimmed);
                if trimmed.contains(" pv ") {
                    // Parse multipv index (1-based)
                    let pv_idx = parse_multipv_index(trimmed).unwrap_or(1).saturating_sub(1);
                    let first_move = parse_pv(trimmed).into_iter().next();
                    if let (Some(entry), Some(score), Some(first_move)) =
                        (slots.get_mut(pv_idx as usize), score, first_move)
                    {
                        *entry = Some(PvSlot {
                            depth: info_depth.unwrap_or(0),
                            first_move,
                            score,
                        });
                    }
                } else if score.is_some() {
                    terminal_score = score;
                }
            } else if trimmed.starts_with("bestmove") {
                break;
            }
        }

        let white_to_move = side_to_move_is_white(fen);
        let to_white = |score: Evaluation| {
            if white_to_move {
                score
            } else {
                score.negate()
            }
        };

        let mut lines: Vec<EngineLine> = slots
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(i, slot)| EngineLine {
                id: i as u32 + 1,
                depth: slot.depth,
                move_uci: slot.first_move,
                evaluation: to_white(slot.score),
            })
            .collect();

        if lines.is_empty() {
            if let Some(score) = terminal_score {
                lines.push(EngineLine {
                    id: 1,
                    depth,
                    move_uci: String::new(),
                    evaluation: to_white(score),
                });
                gauge.raise(depth);
            }
        }

        Ok(lines)
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

/// Runs each evaluation in its own short-lived Stockfish process.
#[derive(Debug, Clone)]
pub struct StockfishEvaluator {
    path: String,
    hash_mb: u32,
}

impl StockfishEvaluator {
    pub fn new(path: impl Into<String>, hash_mb: u32) -> Self {
        Self {
            path: path.into(),
            hash_mb,
        }
    }
}

impl LocalEvaluator for StockfishEvaluator {
    async fn evaluate(
        &self,
        fen: &str,
        depth: u32,
        gauge: DepthGauge,
    ) -> Result<Vec<EngineLine>, ReviewError> {
        let mut engine = StockfishEngine::new(&self.path, self.hash_mb).await?;
        let lines = engine.evaluate(fen, depth, &gauge).await;
        engine.quit().await;
        lines
    }
}

/// Value following `key` in a whitespace-separated info line
fn parse_after<T: std::str::FromStr>(line: &str, key: &str) -> Option<T> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == key && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse search depth from info line
fn parse_depth(line: &str) -> Option<u32> {
    parse_after(line, "depth")
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    parse_after(line, "cp")
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    parse_after(line, "mate")
}

/// Score of an info line, side-to-move relative
fn parse_score(line: &str) -> Option<Evaluation> {
    if let Some(mate) = parse_mate(line) {
        return Some(Evaluation::Mate(mate));
    }
    parse_cp(line).map(Evaluation::Centipawns)
}

/// Parse multipv index from info line
fn parse_multipv_index(line: &str) -> Option<u32> {
    parse_after(line, "multipv")
}

/// Parse PV moves from info line
fn parse_pv(line: &str) -> Vec<String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut in_pv = false;
    let mut moves = Vec::new();

    for part in parts {
        if part == "pv" {
            in_pv = true;
            continue;
        }
        if in_pv {
            // PV ends at next keyword or end of line
            if part.starts_with("bmc") || part == "string" {
                break;
            }
            moves.push(part.to_string());
        }
    }

    moves
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cp() {
        let line = "info depth 20 seldepth 25 multipv 1 score cp 35 nodes 100000 pv e2e4";
        assert_eq!(parse_cp(line), Some(35));
        assert_eq!(parse_depth(line), Some(20));
        assert_eq!(parse_multipv_index(line), Some(1));
    }

    #[test]
    fn test_parse_mate() {
        let line = "info depth 20 score mate 3 nodes 100000 pv e2e4";
        assert_eq!(parse_mate(line), Some(3));
        assert_eq!(parse_score(line), Some(Evaluation::Mate(3)));
    }

    #[test]
    fn test_parse_pv() {
        let line = "info depth 20 score cp 35 pv e2e4 e7e5 g1f3";
        let pv = parse_pv(line);
        assert_eq!(pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn test_parse_score_without_pv() {
        let line = "info depth 0 score mate 0";
        assert_eq!(parse_score(line), Some(Evaluation::Mate(0)));
        assert!(parse_pv(line).is_empty());
    }

    #[test]
    fn test_seldepth_not_confused_with_depth() {
        let line = "info seldepth 30 depth 12 multipv 2 score cp -8 pv d2d4";
        assert_eq!(parse_depth(line), Some(12));
    }
}
