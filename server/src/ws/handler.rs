use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;

use crate::auth::middleware::{parse_user_id, user_id_from_headers};
use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for the WebSocket handshake.
/// Browsers cannot set headers on a WebSocket upgrade, so the identity may
/// come as ?userId=; the x-user-id header is used otherwise.
#[derive(Debug, Deserialize)]
pub struct HandshakeQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// GET /ws?userId=ID
/// WebSocket upgrade endpoint. The connection is always upgraded; a missing
/// identity is rejected by the session right after, with close code 4001.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<HandshakeQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let claimed = params
        .user_id
        .as_deref()
        .and_then(parse_user_id)
        .or_else(|| user_id_from_headers(&headers));

    if claimed.is_none() {
        tracing::warn!("WebSocket handshake without user identity");
    }

    ws.on_upgrade(move |socket| actor::run_connection(socket, state, claimed))
}
