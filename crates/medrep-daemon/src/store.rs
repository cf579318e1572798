//! SQLite persistence for accounts and reports.
//!
//! The store is an explicitly constructed handle over a single
//! process-lifetime connection behind a mutex. The composition root opens
//! it and injects it into the router state; nothing here is global or
//! lazily initialized.
//!
//! # Security Invariants
//!
//! - Every report statement filters on `created_by`. An unowned row and a
//!   missing row are indistinguishable to callers.
//! - The LOCAL -> PUSHED transition and draft updates are conditional
//!   writes (`... AND status = 'LOCAL'`), so a concurrent racer observes
//!   zero rows affected instead of clobbering a committed push. This holds
//!   across processes sharing the database file, not just across handlers
//!   sharing this mutex.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use medrep_core::account::Account;
use medrep_core::report::{Report, ReportDraft, ReportStatus};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Schema applied on every open. `IF NOT EXISTS` keeps reopen idempotent.
///
/// The `CHECK` on `reports` pins the invariant that `national_id` is
/// non-null exactly when the report is `PUSHED`.
const SCHEMA_SQL: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS accounts (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS reports (
    id           TEXT PRIMARY KEY,
    patient_name TEXT NOT NULL,
    diagnosis    TEXT NOT NULL,
    created_by   TEXT NOT NULL REFERENCES accounts(id),
    status       TEXT NOT NULL DEFAULT 'LOCAL'
                     CHECK (status IN ('LOCAL', 'PUSHED')),
    national_id  TEXT,
    created_at   INTEGER NOT NULL,
    CHECK ((status = 'PUSHED') = (national_id IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_reports_owner
    ON reports (created_by, created_at DESC);
";

const REPORT_COLUMNS: &str = "id, patient_name, diagnosis, created_by, status, national_id, created_at";

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection mutex poisoned by a panicking holder.
    #[error("database lock poisoned")]
    Poisoned,

    /// A stored row violates an invariant the schema should have upheld.
    #[error("stored data is corrupt: {reason}")]
    Corrupt {
        /// What was found.
        reason: String,
    },
}

/// Outcome of a conditional report mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// The write matched and the updated record is returned.
    Applied(Report),
    /// Row absent, or owned by someone else.
    NotFound,
    /// Row exists and is owned, but is not `LOCAL`.
    StatusConflict,
}

/// Handle to the accounts and reports tables.
///
/// Cloning is cheap; clones share one connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (creating if needed) the database at `path` and applies the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the file cannot be opened or
    /// the schema cannot be applied.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "report store opened");
        Ok(store)
    }

    /// Opens a fresh in-memory database. Used by tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Inserts a new account with an already-hashed password.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure, including the UNIQUE
    /// violation when the email is already taken.
    pub fn create_account(
        &self,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: truncate_to_millis(now)?,
        };
        self.conn()?.execute(
            "INSERT INTO accounts (id, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                account.id.to_string(),
                account.email,
                account.password_hash,
                account.created_at.timestamp_millis(),
            ],
        )?;
        Ok(account)
    }

    /// Looks up an account by exact, case-sensitive email.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                "SELECT id, email, password_hash, created_at
                 FROM accounts WHERE email = ?1",
                params![email],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    // ========================================================================
    // Reports
    // ========================================================================

    /// Persists a fresh `LOCAL` report owned by `subject_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on insert failure, including the
    /// foreign-key violation when `subject_id` has no account row.
    pub fn create_report(
        &self,
        subject_id: Uuid,
        draft: &ReportDraft,
        now: DateTime<Utc>,
    ) -> Result<Report, StoreError> {
        let report = Report {
            id: Uuid::new_v4(),
            patient_name: draft.patient_name().to_string(),
            diagnosis: draft.diagnosis().to_string(),
            created_by: subject_id,
            status: ReportStatus::Local,
            national_id: None,
            created_at: truncate_to_millis(now)?,
        };
        self.conn()?.execute(
            "INSERT INTO reports (id, patient_name, diagnosis, created_by, status, national_id, created_at)
             VALUES (?1, ?2, ?3, ?4, 'LOCAL', NULL, ?5)",
            params![
                report.id.to_string(),
                report.patient_name,
                report.diagnosis,
                report.created_by.to_string(),
                report.created_at.timestamp_millis(),
            ],
        )?;
        Ok(report)
    }

    /// Fetches one report, owner-filtered. `None` covers both a missing row
    /// and a row owned by someone else.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub fn get_report(&self, subject_id: Uuid, id: &str) -> Result<Option<Report>, StoreError> {
        let conn = self.conn()?;
        Ok(select_report(&conn, subject_id, id)?)
    }

    /// Lists the subject's reports, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub fn list_reports(&self, subject_id: Uuid) -> Result<Vec<Report>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports
             WHERE created_by = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![subject_id.to_string()], report_from_row)?;
        let reports = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(reports)
    }

    /// Replaces the draft fields of a `LOCAL` report.
    ///
    /// The write carries `AND status = 'LOCAL'`, so a push that commits
    /// between the status check and the update surfaces as
    /// [`Mutation::StatusConflict`] instead of mutating a pushed report.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on statement failure.
    pub fn update_report(
        &self,
        subject_id: Uuid,
        id: &str,
        draft: &ReportDraft,
    ) -> Result<Mutation, StoreError> {
        let conn = self.conn()?;
        let Some(current) = select_report(&conn, subject_id, id)? else {
            return Ok(Mutation::NotFound);
        };
        if current.status != ReportStatus::Local {
            return Ok(Mutation::StatusConflict);
        }

        let rows = conn.execute(
            "UPDATE reports SET patient_name = ?1, diagnosis = ?2
             WHERE id = ?3 AND created_by = ?4 AND status = 'LOCAL'",
            params![
                draft.patient_name(),
                draft.diagnosis(),
                id,
                subject_id.to_string(),
            ],
        )?;
        if rows == 0 {
            return resolve_missed_write(&conn, subject_id, id);
        }

        reread_applied(&conn, subject_id, id)
    }

    /// Commits the LOCAL -> PUSHED transition with the registry-assigned id.
    ///
    /// This is the serialization point of the push state machine: exactly
    /// one caller per report observes [`Mutation::Applied`]; a losing racer
    /// gets [`Mutation::StatusConflict`] (or [`Mutation::NotFound`] after a
    /// concurrent delete) and must not retry the registry call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on statement failure.
    pub fn mark_pushed(
        &self,
        subject_id: Uuid,
        id: &str,
        national_id: &str,
    ) -> Result<Mutation, StoreError> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE reports SET status = 'PUSHED', national_id = ?1
             WHERE id = ?2 AND created_by = ?3 AND status = 'LOCAL'",
            params![national_id, id, subject_id.to_string()],
        )?;
        if rows == 0 {
            return resolve_missed_write(&conn, subject_id, id);
        }

        reread_applied(&conn, subject_id, id)
    }

    /// Deletes a report in any status. Returns `false` when nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on statement failure.
    pub fn delete_report(&self, subject_id: Uuid, id: &str) -> Result<bool, StoreError> {
        let rows = self.conn()?.execute(
            "DELETE FROM reports WHERE id = ?1 AND created_by = ?2",
            params![id, subject_id.to_string()],
        )?;
        Ok(rows > 0)
    }
}

fn select_report(
    conn: &Connection,
    subject_id: Uuid,
    id: &str,
) -> Result<Option<Report>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1 AND created_by = ?2"),
        params![id, subject_id.to_string()],
        report_from_row,
    )
    .optional()
}

/// Classifies a conditional write that matched zero rows. The row either
/// vanished or stopped being `LOCAL`; finding it still `LOCAL` would mean
/// the write should have matched.
fn resolve_missed_write(
    conn: &Connection,
    subject_id: Uuid,
    id: &str,
) -> Result<Mutation, StoreError> {
    match select_report(conn, subject_id, id)? {
        None => Ok(Mutation::NotFound),
        Some(report) if report.status == ReportStatus::Local => Err(StoreError::Corrupt {
            reason: format!("conditional write on report {id} matched no rows but row is LOCAL"),
        }),
        Some(_) => Ok(Mutation::StatusConflict),
    }
}

fn reread_applied(conn: &Connection, subject_id: Uuid, id: &str) -> Result<Mutation, StoreError> {
    match select_report(conn, subject_id, id)? {
        Some(report) => Ok(Mutation::Applied(report)),
        None => Err(StoreError::Corrupt {
            reason: format!("report {id} vanished between write and read-back"),
        }),
    }
}

fn report_from_row(row: &Row<'_>) -> Result<Report, rusqlite::Error> {
    let id: String = row.get(0)?;
    let created_by: String = row.get(3)?;
    let status: String = row.get(4)?;
    let created_at: i64 = row.get(6)?;
    Ok(Report {
        id: Uuid::parse_str(&id).map_err(|e| invalid_column(0, e))?,
        patient_name: row.get(1)?,
        diagnosis: row.get(2)?,
        created_by: Uuid::parse_str(&created_by).map_err(|e| invalid_column(3, e))?,
        status: ReportStatus::from_str(&status).map_err(|e| invalid_column(4, e))?,
        national_id: row.get(5)?,
        created_at: DateTime::from_timestamp_millis(created_at)
            .ok_or_else(|| invalid_column(6, OutOfRangeTimestamp(created_at)))?,
    })
}

fn account_from_row(row: &Row<'_>) -> Result<Account, rusqlite::Error> {
    let id: String = row.get(0)?;
    let created_at: i64 = row.get(3)?;
    Ok(Account {
        id: Uuid::parse_str(&id).map_err(|e| invalid_column(0, e))?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: DateTime::from_timestamp_millis(created_at)
            .ok_or_else(|| invalid_column(3, OutOfRangeTimestamp(created_at)))?,
    })
}

fn invalid_column(
    index: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

#[derive(Debug, Error)]
#[error("timestamp {0} is outside the representable range")]
struct OutOfRangeTimestamp(i64);

/// Drops sub-millisecond precision so the value handed back to callers is
/// byte-identical to what a later read returns.
fn truncate_to_millis(now: DateTime<Utc>) -> Result<DateTime<Utc>, StoreError> {
    let millis = now.timestamp_millis();
    DateTime::from_timestamp_millis(millis).ok_or_else(|| StoreError::Corrupt {
        reason: format!("timestamp {millis} is outside the representable range"),
    })
}
