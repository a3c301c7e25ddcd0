use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::error;

use syntra_types::models::ChangeHistoryRecord;

use crate::state::AppState;

/// GET /change-history/{snippet_id} -- newest first, unpaginated.
pub async fn list_history(
    State(state): State<AppState>,
    Path(snippet_id): Path<String>,
) -> Result<Json<Vec<ChangeHistoryRecord>>, StatusCode> {
    state.history.list(&snippet_id).await.map(Json).map_err(|e| {
        error!("Failed to load history for {}: {}", snippet_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
