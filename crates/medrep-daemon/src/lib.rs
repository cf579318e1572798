//! medrep-daemon - HTTP daemon for the medrep clinician reporting service
//!
//! The daemon exposes the login and report endpoints over HTTP, persists
//! reports in SQLite, and drives the one-way LOCAL -> PUSHED transition
//! against the national registry. Domain logic (credentials, password
//! hashing, validation, configuration) lives in `medrep-core`; this crate
//! owns the I/O: routing, storage, and the registry client.
//!
//! The binary lives in `main.rs`; everything else is a library so the
//! integration tests can build the router in-process and drive it without a
//! socket.
//!
//! # Modules
//!
//! - [`http`]: axum router, session gate, and request handlers
//! - [`push`]: push orchestration for the LOCAL -> PUSHED transition
//! - [`registry`]: national registry client (HTTP and test mock)
//! - [`state`]: shared application state injected into handlers
//! - [`store`]: SQLite persistence for accounts and reports

pub mod http;
pub mod push;
pub mod registry;
pub mod state;
pub mod store;
