//! Lichess cloud-eval client.
//!
//! Looks up pre-computed evaluations by FEN. Every way of not getting usable
//! lines is a `RemoteError`; the orchestrator treats them all as a miss.

use std::time::Duration;

use chess_core::{EngineLine, Evaluation};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::error::ReviewError;
use crate::evaluator::RemoteEvaluator;

/// Candidate lines requested per lookup.
const CLOUD_MULTI_PV: u32 = 2;

/// Fewer lines than this and the lookup counts as a miss.
pub const MIN_CLOUD_LINES: usize = 2;

/// Cloud lines encode castling as king-takes-rook; rewrite to the king's
/// destination square.
const CLOUD_UCI_FIXES: [(&str, &str); 4] = [
    ("e8h8", "e8g8"),
    ("e1h1", "e1g1"),
    ("e8a8", "e8c8"),
    ("e1a1", "e1c1"),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("only {0} candidate lines")]
    InsufficientLines(usize),
}

#[derive(Deserialize)]
struct CloudEvalResponse {
    pvs: Vec<CloudPv>,
}

#[derive(Deserialize)]
struct CloudPv {
    moves: String,
    cp: Option<i32>,
    mate: Option<i32>,
}

pub struct CloudClient {
    client: Client,
    base_url: String,
}

impl CloudClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ReviewError> {
        let client = Client::builder()
            .user_agent("GameReview/1.0")
            .timeout(timeout)
            .build()
            .map_err(|e| ReviewError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl RemoteEvaluator for CloudClient {
    async fn fetch(&self, fen: &str, depth: u32) -> Result<Vec<EngineLine>, RemoteError> {
        let url = format!("{}/api/cloud-eval", self.base_url);
        let multi_pv = CLOUD_MULTI_PV.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[("fen", fen), ("multiPv", multi_pv.as_str())])
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if resp.status() != StatusCode::OK {
            debug!(fen, status = %resp.status(), "No cloud evaluation");
            return Err(RemoteError::Status(resp.status().as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| RemoteError::Network(format!("Body read error: {e}")))?;

        parse_cloud_response(&body, depth)
    }
}

/// Turn a cloud-eval JSON body into ranked lines at `depth`.
pub fn parse_cloud_response(body: &str, depth: u32) -> Result<Vec<EngineLine>, RemoteError> {
    let response: CloudEvalResponse =
        serde_json::from_str(body).map_err(|e| RemoteError::Malformed(e.to_string()))?;

    let lines = response
        .pvs
        .into_iter()
        .enumerate()
        .map(|(i, pv)| {
            let evaluation = match (pv.cp, pv.mate) {
                (Some(cp), _) => Evaluation::Centipawns(cp),
                (None, Some(mate)) => Evaluation::Mate(mate),
                (None, None) => {
                    return Err(RemoteError::Malformed(format!("pv {} has no score", i + 1)))
                }
            };
            let first_move = pv.moves.split_whitespace().next().unwrap_or_default();

            Ok(EngineLine {
                id: i as u32 + 1,
                depth,
                move_uci: fix_cloud_uci(first_move).to_string(),
                evaluation,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if lines.len() < MIN_CLOUD_LINES {
        return Err(RemoteError::InsufficientLines(lines.len()));
    }

    Ok(lines)
}

/// Apply the castling rewrite table; any other move passes through.
pub fn fix_cloud_uci(uci: &str) -> &str {
    CLOUD_UCI_FIXES
        .iter()
        .find(|(raw, _)| *raw == uci)
        .map(|(_, fixed)| *fixed)
        .unwrap_or(uci)
}
