use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use review_engine::chess_core::PgnError;
use review_engine::error::ReviewError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Review(#[from] ReviewError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Review(e @ ReviewError::RunInProgress) => (StatusCode::CONFLICT, e.to_string()),
            AppError::Review(
                e @ (ReviewError::Pgn(_)
                | ReviewError::InvalidDepth { .. }
                | ReviewError::NoPositions
                | ReviewError::InvalidSavefile(_)),
            ) => (StatusCode::BAD_REQUEST, user_message(e)),
            AppError::Review(e) => {
                tracing::error!("Review error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, user_message(e))
            }
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}

/// Message shown to the user for a failed review.
pub fn user_message(error: &ReviewError) -> String {
    match error {
        ReviewError::Pgn(PgnError::Empty) => "Provide a game to analyse.".to_string(),
        ReviewError::Pgn(_) => "Failed to parse PGN.".to_string(),
        ReviewError::Report(_) => "Failed to generate report.".to_string(),
        ReviewError::InvalidSavefile(_) => "Invalid savefile.".to_string(),
        ReviewError::InvalidDepth { .. } | ReviewError::RunInProgress => error.to_string(),
        _ => format!("Analysis failed: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            user_message(&ReviewError::Pgn(PgnError::Empty)),
            "Provide a game to analyse."
        );
        assert_eq!(
            user_message(&ReviewError::Pgn(PgnError::IllegalMove {
                ply: 1,
                san: "Ke5".into()
            })),
            "Failed to parse PGN."
        );
        assert_eq!(
            user_message(&ReviewError::Report("no evaluation".into())),
            "Failed to generate report."
        );
    }

    #[test]
    fn test_status_codes() {
        let conflict = AppError::Review(ReviewError::RunInProgress).into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let bad = AppError::Review(ReviewError::InvalidSavefile("eof".into())).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let failed = AppError::Review(ReviewError::Stockfish("crashed".into())).into_response();
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
