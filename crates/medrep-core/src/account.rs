//! Clinician account records.
//!
//! Accounts exist only as login subjects. There is no self-service
//! registration; the daemon's bootstrap step (or an operator with direct
//! store access) creates them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A stored account.
///
/// The `Debug` impl redacts `password_hash`: the hash is not a secret in the
/// cryptographic sense, but it has no business in logs.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Subject identifier embedded in issued credentials.
    pub id: Uuid,
    /// Unique login key, matched case-sensitively and exactly.
    pub email: String,
    /// Argon2id PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Server-assigned creation instant.
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}
