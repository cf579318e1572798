//! Report records and the LOCAL/PUSHED lifecycle.
//!
//! A report is authored locally and later pushed to the national registry at
//! most once. The transition is one-way:
//!
//! ```text
//! LOCAL --push--> PUSHED (terminal)
//! ```
//!
//! # Invariants
//!
//! - `national_id` is non-null **iff** `status = PUSHED`.
//! - `created_by` is the sole authorization key; every exposed operation
//!   filters on it.
//! - `id`, `created_by`, and `created_at` never change after creation;
//!   `national_id` never changes once set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::validate::{
    MAX_DIAGNOSIS_LEN, MAX_PATIENT_NAME_LEN, MIN_TEXT_LEN, ValidationError, validate_text,
};

/// Lifecycle state of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportStatus {
    /// Authored locally, not yet submitted to the registry.
    Local,
    /// Submitted to the registry; terminal.
    Pushed,
}

impl ReportStatus {
    /// Returns the canonical storage/wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Pushed => "PUSHED",
        }
    }
}

/// A status string outside {`LOCAL`, `PUSHED`}.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown report status {0:?}")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for ReportStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCAL" => Ok(Self::Local),
            "PUSHED" => Ok(Self::Pushed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Server-generated identifier, immutable.
    pub id: Uuid,
    /// Patient the report concerns.
    pub patient_name: String,
    /// Free-text diagnosis.
    pub diagnosis: String,
    /// Owning subject, set at creation, immutable.
    pub created_by: Uuid,
    /// Lifecycle state.
    pub status: ReportStatus,
    /// Registry-assigned identifier; present only once pushed.
    pub national_id: Option<String>,
    /// Server-assigned creation instant, immutable.
    pub created_at: DateTime<Utc>,
}

/// Validated create/update input for a report.
///
/// Both the collection `POST` and per-report `PUT` carry this shape; the
/// constructor trims and bounds both fields, so a held `ReportDraft` is
/// always well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDraft {
    patient_name: String,
    diagnosis: String,
}

impl ReportDraft {
    /// Validates raw input into a draft.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the offending field when either
    /// value is missing or out of bounds.
    pub fn new(patient_name: &str, diagnosis: &str) -> Result<Self, ValidationError> {
        let patient_name =
            validate_text("patientName", patient_name, MIN_TEXT_LEN, MAX_PATIENT_NAME_LEN)?;
        let diagnosis = validate_text("diagnosis", diagnosis, MIN_TEXT_LEN, MAX_DIAGNOSIS_LEN)?;
        Ok(Self {
            patient_name,
            diagnosis,
        })
    }

    /// Trimmed patient name.
    #[must_use]
    pub fn patient_name(&self) -> &str {
        &self.patient_name
    }

    /// Trimmed diagnosis.
    #[must_use]
    pub fn diagnosis(&self) -> &str {
        &self.diagnosis
    }
}
