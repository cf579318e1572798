//! Error boundary between domain errors and HTTP responses.
//!
//! Every error leaves the daemon as `{"error": "..."}` with a status code.
//! Messages are written for the caller; internal detail stays in the logs.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use medrep_core::password::PasswordError;
use medrep_core::token::TokenError;
use medrep_core::validate::ValidationError;
use serde_json::json;
use tracing::error;

use crate::push::PushError;
use crate::store::StoreError;

/// An HTTP-facing error: status code plus caller-facing message.
#[derive(Debug)]
pub struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

/// Handler result alias.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Single answer for every authentication failure, so callers cannot
    /// distinguish a missing token from a bad or expired one.
    pub fn unauthenticated() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "authentication required".to_string(),
        }
    }

    /// Single answer for every login failure, identical for an unknown
    /// email and a wrong password.
    pub fn invalid_credentials() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "invalid email or password".to_string(),
        }
    }

    /// Covers both a genuinely missing report and one owned by someone
    /// else.
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "report not found".to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    pub fn registry_unavailable() -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: "national registry request failed".to_string(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!(error = %err, "store operation failed");
        Self::internal()
    }
}

impl From<PushError> for ApiError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::NotFound => Self::not_found(),
            PushError::AlreadyPushed => Self::conflict("report already pushed"),
            PushError::Registry(e) => {
                error!(error = %e, "registry submission failed");
                Self::registry_unavailable()
            }
            PushError::Store(e) => {
                error!(error = %e, "store operation failed during push");
                Self::internal()
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        error!(error = %err, "token issuance failed");
        Self::internal()
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        error!(error = %err, "password hashing failed");
        Self::internal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryError;

    #[test]
    fn push_errors_map_to_their_statuses() {
        assert_eq!(
            ApiError::from(PushError::NotFound).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(PushError::AlreadyPushed).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(PushError::Registry(RegistryError::Transport(
                "boom".to_string()
            )))
            .status,
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn auth_failures_share_one_message() {
        let a = ApiError::unauthenticated();
        let b = ApiError::unauthenticated();
        assert_eq!(a.status, StatusCode::UNAUTHORIZED);
        assert_eq!(a.message, b.message);
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let err = ValidationError::TooShort {
            field: "patientName",
            min: 2,
        };
        let api = ApiError::from(err);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert!(api.message.contains("patientName"));
    }
}
