use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::error;

use syntra_types::api::SnippetResponse;

use crate::state::AppState;

/// GET /snippets/{id} -- authoritative code and metadata used to seed an
/// editor before it joins the room.
pub async fn get_snippet(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SnippetResponse>, StatusCode> {
    let snippet = state
        .db
        .get_snippet(&id)
        .map_err(|e| {
            error!("Failed to load snippet {}: {:#}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let comment_count = state.db.count_comments(&id).map_err(|e| {
        error!("Failed to count comments for {}: {:#}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(SnippetResponse {
        line_count: snippet.line_count(),
        snippet,
        comment_count,
    }))
}
