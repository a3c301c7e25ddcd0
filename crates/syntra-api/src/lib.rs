pub mod comments;
pub mod history;
pub mod middleware;
pub mod snippets;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

pub use state::{AppState, AppStateInner};

/// REST routes that seed clients before they join a room. All of them need
/// a bearer token.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/snippets/{id}", get(snippets::get_snippet))
        .route("/comments", post(comments::create_comment))
        .route("/comments/{snippet_id}", get(comments::list_comments))
        .route("/change-history/{snippet_id}", get(history::list_history))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state)
}
