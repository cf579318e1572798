//! HTTP surface of the daemon.
//!
//! # Modules
//!
//! - [`error`]: maps domain errors to status codes and `{"error": ...}`
//!   bodies
//! - [`login`]: credential exchange for a session token
//! - [`reports`]: report CRUD and registry push
//! - [`session`]: cookie and bearer-token authentication
//!
//! # Endpoints
//!
//! - `POST /login`
//! - `GET /reports`, `POST /reports`
//! - `GET /reports/{id}`, `PUT /reports/{id}`, `DELETE /reports/{id}`
//! - `POST /reports/{id}/push`
//! - `GET /healthz` (unauthenticated liveness probe)

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::state::SharedState;

pub mod error;
pub mod login;
pub mod reports;
pub mod session;

/// Builds the daemon router around the injected state.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(login::login))
        .route(
            "/reports",
            get(reports::list_reports).post(reports::create_report),
        )
        .route(
            "/reports/:id",
            get(reports::get_report)
                .put(reports::update_report)
                .delete(reports::delete_report),
        )
        .route("/reports/:id/push", post(reports::push_report))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
