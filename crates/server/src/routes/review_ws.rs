//! WebSocket review route
//!
//! Runs a full game review for the connected client and streams live
//! progress while cloud lookups and local Stockfish workers fill the
//! positions. One review runs at a time process-wide; other clients are
//! told the server is busy.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use review_engine::chess_core::{EvaluatedPosition, Players};
use review_engine::config::ReviewConfig;
use review_engine::error::ReviewError;
use review_engine::orchestrator::ReviewTask;
use review_engine::progress::Phase;
use review_engine::report::Report;

use crate::error::user_message;
use crate::state::SharedOrchestrator;

// ---- Message types ----

/// Server → Client messages
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Progress {
        phase: Phase,
        percent: f64,
    },
    Busy,
    ReviewComplete {
        players: Players,
        positions: Vec<EvaluatedPosition>,
        results: Report,
    },
    Error {
        message: String,
    },
}

/// Client → Server messages
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    ReviewGame { pgn: String, depth: Option<u32> },
}

type WsSender = SplitSink<WebSocket, Message>;

// ---- WebSocket handler ----

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(orchestrator): Extension<SharedOrchestrator>,
    Extension(config): Extension<ReviewConfig>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, orchestrator, config.default_depth))
}

async fn handle_socket(socket: WebSocket, orchestrator: SharedOrchestrator, default_depth: u32) {
    let (mut sender, mut receiver) = socket.split();

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };

        let client_msg: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                let message = format!("Invalid message: {e}");
                if !send(&mut sender, &ServerMessage::Error { message }).await {
                    break;
                }
                continue;
            }
        };

        let ClientMessage::ReviewGame { pgn, depth } = client_msg;
        let depth = depth.unwrap_or(default_depth);
        if !review_game(&mut sender, &orchestrator, pgn, depth).await {
            break;
        }
    }
}

/// Run one review, forwarding progress. Returns false once the client is gone.
async fn review_game(
    sender: &mut WsSender,
    orchestrator: &SharedOrchestrator,
    pgn: String,
    depth: u32,
) -> bool {
    // The run keeps going if the client disconnects; dropping the handle only detaches it
    let ReviewTask {
        mut progress,
        mut handle,
    } = match orchestrator.spawn_review(&pgn, depth) {
        Ok(task) => task,
        Err(ReviewError::RunInProgress) => return send(sender, &ServerMessage::Busy).await,
        Err(e) => return send(sender, &error_message(&e)).await,
    };

    let joined = loop {
        tokio::select! {
            biased;
            joined = &mut handle => break joined,
            Ok(()) = progress.changed() => {
                let current = *progress.borrow_and_update();
                let update = ServerMessage::Progress {
                    phase: current.phase,
                    percent: current.percent,
                };
                if !send(sender, &update).await {
                    return false;
                }
                // Anything after this run's terminal phase belongs to the next run
                if matches!(current.phase, Phase::Complete | Phase::Failed) {
                    break (&mut handle).await;
                }
            }
        }
    };

    let reply = match joined {
        Ok(Ok(review)) => ServerMessage::ReviewComplete {
            players: review.players,
            positions: review.positions,
            results: review.report,
        },
        Ok(Err(e)) => error_message(&e),
        Err(e) => {
            tracing::error!(error = %e, "Review task panicked");
            ServerMessage::Error {
                message: "Analysis failed".to_string(),
            }
        }
    };

    send(sender, &reply).await
}

fn error_message(error: &ReviewError) -> ServerMessage {
    tracing::warn!(error = %error, "Review failed");
    ServerMessage::Error {
        message: user_message(error),
    }
}

async fn send(sender: &mut WsSender, message: &ServerMessage) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize server message");
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}
