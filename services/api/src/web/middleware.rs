//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use gophermart_core::token_cache::TokenLookup;
use std::sync::Arc;
use tracing::{debug, error};

use crate::config::SessionPolicy;
use crate::web::auth::{extract_token, session_cookie};
use crate::web::state::{AppState, AuthUser};

/// Middleware that resolves the session token to a login.
///
/// If valid, inserts an [`AuthUser`] into request extensions for handlers to use.
/// Unknown and expired tokens both get 401 Unauthorized. Under
/// [`SessionPolicy::Refresh`] a request restarts the session's lifetime and
/// re-issues the cookie, provided the session was not logged out in the meantime.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the token from cookie or bearer header
    let token = extract_token(req.headers()).ok_or_else(|| {
        debug!("Unauthorized request: token missing");
        StatusCode::UNAUTHORIZED
    })?;

    // 2. Resolve it through the session cache
    let login = match state.tokens.get_token_user(&token) {
        TokenLookup::Valid(login) => login,
        TokenLookup::NotFound => {
            debug!("Unauthorized request: unknown token");
            return Err(StatusCode::UNAUTHORIZED);
        }
        TokenLookup::Expired => {
            debug!("Unauthorized request: token expired");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // 3. Insert the login into request extensions
    req.extensions_mut().insert(AuthUser(login));

    // 4. Continue to the handler
    let mut response = next.run(req).await;

    // 5. Slide the session window, unless the session ended while the handler ran
    if state.config.session_policy == SessionPolicy::Refresh
        && state.tokens.refresh_token(&token)
    {
        match HeaderValue::from_str(&session_cookie(&token, state.tokens.lifetime())) {
            Ok(cookie) => {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Err(e) => error!("Failed to build refreshed session cookie: {:?}", e),
        }
    }

    Ok(response)
}
