//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use gophermart_core::ports::DatabaseService;
use gophermart_core::token_cache::TokenCache;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub tokens: Arc<TokenCache>,
}

/// Login of the authenticated caller, inserted into request extensions by
/// [`require_auth`](crate::web::middleware::require_auth).
#[derive(Clone, Debug)]
pub struct AuthUser(pub String);
