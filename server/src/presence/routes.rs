//! REST endpoints for online status, read from the durable user records.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::middleware::AuthUser;
use crate::db::models::{UserId, UserStatus};
use crate::db::store::blocking;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub user_id: UserId,
    pub is_online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// GET /api/users/online — Users whose online flag is set. Auth required.
pub async fn get_online_users(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> Result<Json<Vec<UserStatus>>, StatusCode> {
    let users = blocking(state.users.clone(), |users| users.online_users())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list online users");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(users))
}

/// GET /api/users/{id}/status — Online flag and last-seen stamp. Auth required.
pub async fn get_user_status(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let status = blocking(state.users.clone(), move |users| users.status(user_id))
        .await
        .map_err(|e| {
            tracing::error!(user_id = user_id, error = %e, "Failed to read user status");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(StatusResponse {
        user_id: status.user_id,
        is_online: status.is_online,
        last_seen_at: status.last_seen_at,
    }))
}
