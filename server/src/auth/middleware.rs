use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};

use crate::db::models::UserId;

/// Header carrying the caller's identity, set by the authentication layer in
/// front of this service once the session has been verified.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller, extracted from the `x-user-id` header.
/// Implements axum's FromRequestParts for use as an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id_from_headers(&parts.headers)
            .map(AuthUser)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// Parse the identity header. Absent, non-UTF-8 or non-numeric values are
/// treated as no identity at all.
pub fn user_id_from_headers(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_user_id)
}

pub fn parse_user_id(raw: &str) -> Option<UserId> {
    raw.trim().parse::<UserId>().ok().filter(|id| *id > 0)
}
