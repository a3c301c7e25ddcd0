pub mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use syntra_api::{AppState, AppStateInner};
use syntra_db::Database;
use syntra_gateway::{Gateway, connection};

#[derive(Clone)]
struct SocketState {
    gateway: Gateway,
    jwt_secret: Arc<str>,
}

#[derive(Debug, Deserialize)]
struct SocketParams {
    token: Option<String>,
}

/// Build the realtime gateway over the durable store.
pub fn gateway(db: &Arc<Database>) -> Gateway {
    Gateway::new(db.clone(), db.clone())
}

/// Full HTTP surface: REST seed routes, the realtime socket and health.
pub fn app(db: Arc<Database>, gateway: Gateway, jwt_secret: String) -> Router {
    let api_state: AppState = Arc::new(AppStateInner {
        db,
        history: gateway.history().clone(),
        jwt_secret: jwt_secret.clone(),
    });

    let socket_route = Router::new()
        .route("/socket", get(ws_upgrade))
        .with_state(SocketState {
            gateway,
            jwt_secret: jwt_secret.into(),
        });

    Router::new()
        .merge(syntra_api::router(api_state))
        .merge(socket_route)
        .route("/health", get(|| async { "ok" }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(
    State(state): State<SocketState>,
    Query(params): Query<SocketParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let credential = params
        .token
        .map(|token| connection::read_credential(token, &state.jwt_secret));
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.gateway, credential))
}
