//! Report CRUD and push endpoints.
//!
//! Every handler authenticates before touching the body or the store, and
//! every store call carries the authenticated subject, so unowned reports
//! are indistinguishable from absent ones.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use medrep_core::report::{Report, ReportDraft};
use serde::Deserialize;

use crate::http::error::{ApiError, ApiResult};
use crate::http::session::authenticate;
use crate::state::SharedState;
use crate::store::Mutation;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBody {
    patient_name: String,
    diagnosis: String,
}

impl ReportBody {
    fn into_draft(self) -> Result<ReportDraft, ApiError> {
        Ok(ReportDraft::new(&self.patient_name, &self.diagnosis)?)
    }
}

fn draft_from(body: Result<Json<ReportBody>, JsonRejection>) -> Result<ReportDraft, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    body.into_draft()
}

/// `GET /reports`
pub async fn list_reports(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Report>>> {
    let subject = authenticate(&headers, &state.minter, Utc::now())?;
    let reports = state.store.list_reports(subject)?;
    Ok(Json(reports))
}

/// `POST /reports`
pub async fn create_report(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<ReportBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    let subject = authenticate(&headers, &state.minter, Utc::now())?;
    let draft = draft_from(body)?;
    let report = state.store.create_report(subject, &draft, Utc::now())?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// `GET /reports/{id}`
pub async fn get_report(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Report>> {
    let subject = authenticate(&headers, &state.minter, Utc::now())?;
    match state.store.get_report(subject, &id)? {
        Some(report) => Ok(Json(report)),
        None => Err(ApiError::not_found()),
    }
}

/// `PUT /reports/{id}`
pub async fn update_report(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<ReportBody>, JsonRejection>,
) -> ApiResult<Json<Report>> {
    let subject = authenticate(&headers, &state.minter, Utc::now())?;
    let draft = draft_from(body)?;
    match state.store.update_report(subject, &id, &draft)? {
        Mutation::Applied(report) => Ok(Json(report)),
        Mutation::NotFound => Err(ApiError::not_found()),
        Mutation::StatusConflict => Err(ApiError::conflict("report already pushed; cannot modify")),
    }
}

/// `DELETE /reports/{id}`
///
/// Deletion is allowed in any status; removing a pushed report locally
/// does not recall it from the registry.
pub async fn delete_report(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let subject = authenticate(&headers, &state.minter, Utc::now())?;
    if state.store.delete_report(subject, &id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}

/// `POST /reports/{id}/push`
pub async fn push_report(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Report>> {
    let subject = authenticate(&headers, &state.minter, Utc::now())?;
    let report = state.pusher.push(subject, &id).await?;
    Ok(Json(report))
}
