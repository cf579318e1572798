//! medrep-core - Domain library for the medrep clinician reporting service
//!
//! This crate holds the pieces of the system that have no I/O of their own:
//! session credentials, password hashing, the report lifecycle types, input
//! validation, and daemon configuration. The `medrep-daemon` crate wires
//! these into an HTTP service backed by SQLite.
//!
//! # Modules
//!
//! - [`token`]: stateless session credentials (HMAC-SHA256 mint/verify)
//! - [`password`]: Argon2id password hashing and verification
//! - [`report`]: report records and the LOCAL/PUSHED lifecycle
//! - [`account`]: clinician account records
//! - [`validate`]: boundary validation shared by HTTP handlers and bootstrap
//! - [`config`]: TOML daemon configuration with fail-closed startup checks

pub mod account;
pub mod config;
pub mod password;
pub mod report;
pub mod token;
pub mod validate;

pub use account::Account;
pub use report::{Report, ReportDraft, ReportStatus};
pub use token::{Session, TokenError, TokenMinter};
pub use validate::ValidationError;
