//! Login endpoint.
//!
//! # Security
//!
//! Unknown emails and wrong passwords produce byte-identical 401 bodies,
//! and a password verification runs on both paths (against a startup-time
//! dummy hash when no account matches) so response timing does not leak
//! which emails exist.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use medrep_core::password::verify_password;
use medrep_core::token::TOKEN_TTL_SECS;
use medrep_core::validate::{validate_email, validate_password};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::http::error::{ApiError, ApiResult};
use crate::http::session::SESSION_COOKIE;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// `POST /login`
///
/// On success returns `{"subjectId": ...}` and sets the session cookie for
/// the token's full lifetime.
pub async fn login(
    State(state): State<SharedState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let email = validate_email(&request.email)?;
    validate_password(&request.password)?;
    let password = request.password;

    let account = state.store.find_account_by_email(&email)?;
    let stored_hash = account
        .as_ref()
        .map_or_else(|| state.dummy_hash.clone(), |a| a.password_hash.clone());

    // Argon2 is deliberately slow; keep it off the async workers. The
    // verification runs even when the account is unknown.
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|_| ApiError::internal())??;

    let Some(account) = account else {
        return Err(ApiError::invalid_credentials());
    };
    if !verified {
        return Err(ApiError::invalid_credentials());
    }

    let token = state.minter.issue(&account.id.to_string(), Utc::now())?;
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; HttpOnly; Path=/; Max-Age={TOKEN_TTL_SECS}; SameSite=Lax");
    if state.secure_cookies {
        cookie.push_str("; Secure");
    }

    info!(subject_id = %account.id, "login succeeded");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "subjectId": account.id })),
    )
        .into_response())
}
