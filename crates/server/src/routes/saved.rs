use axum::Json;
use review_engine::saved::{load_saved, SavedAnalysis};

use crate::error::AppError;

/// POST /api/review/load
/// Validate a saved analysis and echo it back for replay.
pub async fn load_saved_analysis(body: String) -> Result<Json<SavedAnalysis>, AppError> {
    if body.trim().is_empty() {
        return Err(AppError::BadRequest("Provide a savefile.".to_string()));
    }
    Ok(Json(load_saved(&body)?))
}
