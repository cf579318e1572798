//! Request authentication.
//!
//! Tokens arrive either in the `session-token` cookie or as a bearer
//! token. The cookie wins when present. Every failure, from a missing
//! token to a stale signature, collapses into the same 401 before any
//! store access, so probing the gate reveals nothing.

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use medrep_core::token::TokenMinter;
use uuid::Uuid;

use crate::http::error::ApiError;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session-token";

/// Resolves the request to an authenticated subject id.
///
/// # Errors
///
/// Returns [`ApiError::unauthenticated`] for any missing, malformed,
/// tampered, or expired credential.
pub fn authenticate(
    headers: &HeaderMap,
    minter: &TokenMinter,
    now: DateTime<Utc>,
) -> Result<Uuid, ApiError> {
    let token = cookie_token(headers)
        .or_else(|| bearer_token(headers))
        .ok_or_else(ApiError::unauthenticated)?;
    let session = minter
        .verify(token, now)
        .map_err(|_| ApiError::unauthenticated())?;
    Uuid::parse_str(&session.subject_id).map_err(|_| ApiError::unauthenticated())
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, token) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE).then_some(token)
        })
        .next()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
