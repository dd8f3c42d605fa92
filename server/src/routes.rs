use axum::{routing::get, routing::post, Router};

use crate::dm::messages;
use crate::presence::routes as presence_routes;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    // Private message history and read state (identity via x-user-id)
    // Note: static segments are matched before {param} segments by axum.
    let message_routes = Router::new()
        .route(
            "/api/messages/conversation/{other_user_id}",
            get(messages::get_conversation),
        )
        .route("/api/messages/last", get(messages::get_last_messages))
        .route("/api/messages/read/{sender_id}", post(messages::mark_as_read))
        .route("/api/messages/unread/count", get(messages::get_unread_count));

    let user_routes = Router::new()
        .route("/api/users/online", get(presence_routes::get_online_users))
        .route("/api/users/{id}/status", get(presence_routes::get_user_status));

    // WebSocket endpoint (identity via ?userId= or x-user-id)
    let ws_routes = Router::new().route("/ws", get(ws_handler::ws_upgrade));

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(message_routes)
        .merge(user_routes)
        .merge(ws_routes)
        .merge(health)
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
