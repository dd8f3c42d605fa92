//! REST endpoints over the private message store: conversation history,
//! last message per conversation, mark-as-read and unread count.
//!
//! They read and write the same rows the socket relay does; mark-as-read
//! emits the same read receipt as the `private:message:read` socket event.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::middleware::AuthUser;
use crate::db::models::{PrivateMessage, UserId};
use crate::db::store::blocking;
use crate::dm::delivery::mark_conversation_read;
use crate::error::StoreError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}

fn internal_error(e: StoreError) -> (StatusCode, Json<Value>) {
    tracing::error!(error = %e, "Message store failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Message store unavailable" })),
    )
}

/// GET /api/messages/conversation/{other_user_id}
/// Full history with the other user, oldest first. 404 when empty.
pub async fn get_conversation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(other_user_id): Path<UserId>,
) -> Result<Json<Vec<PrivateMessage>>, (StatusCode, Json<Value>)> {
    let messages = blocking(state.messages.clone(), move |store| {
        store.conversation(user_id, other_user_id)
    })
    .await
    .map_err(internal_error)?;

    if messages.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No messages found" })),
        ));
    }

    Ok(Json(messages))
}

/// GET /api/messages/last
/// Latest message of each conversation the caller takes part in.
pub async fn get_last_messages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<PrivateMessage>>, (StatusCode, Json<Value>)> {
    let messages = blocking(state.messages.clone(), move |store| {
        store.last_messages(user_id)
    })
    .await
    .map_err(internal_error)?;

    Ok(Json(messages))
}

/// POST /api/messages/read/{sender_id}
/// Mark everything the sender sent to the caller as read and notify the sender.
pub async fn mark_as_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(sender_id): Path<UserId>,
) -> Result<Json<MarkReadResponse>, (StatusCode, Json<Value>)> {
    let updated = mark_conversation_read(&state, user_id, sender_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(MarkReadResponse { updated }))
}

/// GET /api/messages/unread/count
pub async fn get_unread_count(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UnreadCountResponse>, (StatusCode, Json<Value>)> {
    let count = blocking(state.messages.clone(), move |store| {
        store.unread_count(user_id)
    })
    .await
    .map_err(internal_error)?;

    Ok(Json(UnreadCountResponse { count }))
}
