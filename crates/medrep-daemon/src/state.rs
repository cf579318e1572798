//! Shared handler state.
//!
//! Everything a request handler needs is constructed once in the
//! composition root and injected through axum's `State` extractor. There
//! is no global store handle; tests build their own [`AppState`] around an
//! in-memory database and a mock registry.

use std::sync::Arc;

use medrep_core::token::TokenMinter;

use crate::push::PushOrchestrator;
use crate::registry::RegistryClient;
use crate::store::Store;

/// State shared by all HTTP handlers.
pub struct AppState {
    /// Accounts and reports persistence.
    pub store: Store,
    /// Issues and verifies session tokens.
    pub minter: TokenMinter,
    /// Drives LOCAL -> PUSHED transitions.
    pub pusher: PushOrchestrator,
    /// Adds the `Secure` attribute to session cookies.
    pub secure_cookies: bool,
    /// Hash verified for unknown emails so login timing does not reveal
    /// whether an account exists.
    pub dummy_hash: String,
}

/// Cheaply cloneable handle handed to the router.
pub type SharedState = Arc<AppState>;

impl AppState {
    #[must_use]
    pub fn new(
        store: Store,
        minter: TokenMinter,
        registry: Arc<dyn RegistryClient>,
        secure_cookies: bool,
        dummy_hash: String,
    ) -> Self {
        let pusher = PushOrchestrator::new(store.clone(), registry);
        Self {
            store,
            minter,
            pusher,
            secure_cookies,
            dummy_hash,
        }
    }
}
