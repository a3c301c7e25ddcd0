use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use syntra_types::api::{Claims, CreateCommentRequest};
use syntra_types::models::Annotation;

use crate::state::AppState;

/// POST /comments -- the persistence step for a comment. The realtime
/// `send-comment` only relays; this is where the author is checked.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.text.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let exists = state
        .db
        .get_snippet(&req.snippet_id)
        .map_err(|e| {
            error!("Failed to load snippet {}: {:#}", req.snippet_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .is_some();
    if !exists {
        return Err(StatusCode::NOT_FOUND);
    }

    let annotation = Annotation {
        id: Uuid::new_v4(),
        snippet_id: req.snippet_id,
        line_number: req.line,
        text: req.text,
        author_id: claims.username,
        timestamp: Utc::now(),
    };

    state.db.insert_comment(&annotation).map_err(|e| {
        error!("Failed to store comment on {}: {:#}", annotation.snippet_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    info!(
        "{} commented on {} line {}",
        annotation.author_id, annotation.snippet_id, annotation.line_number
    );
    Ok((StatusCode::CREATED, Json(annotation)))
}

/// GET /comments/{snippet_id} -- newest first.
pub async fn list_comments(
    State(state): State<AppState>,
    Path(snippet_id): Path<String>,
) -> Result<Json<Vec<Annotation>>, StatusCode> {
    state.db.get_comments(&snippet_id).map(Json).map_err(|e| {
        error!("Failed to load comments for {}: {:#}", snippet_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
