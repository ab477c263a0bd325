//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user registration, login, and logout.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use gophermart_core::ports::PortError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::web::protocol::{AuthResponse, CredentialsRequest};
use crate::web::state::AppState;

/// Name of the cookie carrying the session token.
pub const AUTH_COOKIE: &str = "GOPHERMART_AUTH";

//=========================================================================================
// Token Helpers
//=========================================================================================

/// Builds the `Set-Cookie` value for `token`, valid for `max_age`.
///
/// `Max-Age` is rounded up to whole seconds; a sub-second lifetime must not
/// become `Max-Age=0`, which deletes the cookie.
pub fn session_cookie(token: &str, max_age: Duration) -> String {
    let seconds = max_age.as_secs() + u64::from(max_age.subsec_nanos() > 0);
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        AUTH_COOKIE, token, seconds
    )
}

/// Pulls the session token from the auth cookie, falling back to a bearer
/// `Authorization` header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            c.trim()
                .strip_prefix(AUTH_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
                .map(str::to_string)
        })
        .filter(|t| !t.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// Creates a fresh session for `login` and returns the response headers carrying it.
fn issue_session(state: &AppState, login: &str) -> [(header::HeaderName, String); 2] {
    let token = Uuid::new_v4().simple().to_string();
    state.tokens.store_token(login, &token);
    [
        (header::SET_COOKIE, session_cookie(&token, state.tokens.lifetime())),
        (header::AUTHORIZATION, format!("Bearer {}", token)),
    ]
}

fn parse_credentials(
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<CredentialsRequest, (StatusCode, String)> {
    let Json(req) = payload.map_err(|e| (StatusCode::BAD_REQUEST, e.body_text()))?;
    if req.login.trim().is_empty() || req.password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "login and password must not be empty".to_string(),
        ));
    }
    Ok(req)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/user/register - Create a new account and log it in
#[utoipa::path(
    post,
    path = "/api/user/register",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "User registered and authenticated", body = AuthResponse),
        (status = 400, description = "Malformed request"),
        (status = 409, description = "Login already taken"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let req = parse_credentials(payload)?;

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })?
        .to_string();

    // 2. Create the user and its empty balance
    state
        .db
        .register_user(&req.login, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Conflict(msg) => {
                info!(login = %req.login, "Registration rejected: login taken");
                (StatusCode::CONFLICT, msg)
            }
            other => {
                error!("Failed to create user: {:?}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user".to_string())
            }
        })?;

    // 3. Authenticate the new user
    let headers = issue_session(&state, &req.login);
    info!(login = %req.login, "User registered");

    Ok((StatusCode::OK, headers, Json(AuthResponse { login: req.login })))
}

/// POST /api/user/login - Login with existing account
#[utoipa::path(
    post,
    path = "/api/user/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let req = parse_credentials(payload)?;
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid login or password".to_string());

    // 1. Get user by login
    let user_creds = state.db.get_user(&req.login).await.map_err(|e| match e {
        PortError::NotFound(_) => {
            info!(login = %req.login, "Failed login attempt: unknown login");
            invalid()
        }
        other => {
            error!("Failed to get user: {:?}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
        }
    })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    if !valid {
        info!(login = %req.login, "Failed login attempt: bad password");
        return Err(invalid());
    }

    // 3. Issue a session
    let headers = issue_session(&state, &user_creds.login);

    Ok((
        StatusCode::OK,
        headers,
        Json(AuthResponse {
            login: user_creds.login,
        }),
    ))
}

/// POST /api/user/logout - Invalidate the caller's session
#[utoipa::path(
    post,
    path = "/api/user/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let token = extract_token(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    if !state.tokens.remove_token(&token) {
        return Err((StatusCode::UNAUTHORIZED, "No session found".to_string()));
    }

    let cleared = HeaderValue::from_str(&session_cookie("", Duration::ZERO)).map_err(|e| {
        error!("Failed to build logout cookie: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
    })?;

    Ok((StatusCode::OK, [(header::SET_COOKIE, cleared)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_read_from_cookie_first() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; GOPHERMART_AUTH=abc123; other=1"),
        );
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer zzz"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn bearer_header_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer zzz"));
        assert_eq!(extract_token(&headers).as_deref(), Some("zzz"));
    }

    #[test]
    fn similar_cookie_names_and_empty_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("GOPHERMART_AUTH_OLD=x; GOPHERMART_AUTH="),
        );
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn cookie_carries_lifetime() {
        assert_eq!(
            session_cookie("t", Duration::from_secs(300)),
            "GOPHERMART_AUTH=t; HttpOnly; SameSite=Lax; Path=/; Max-Age=300"
        );
    }

    #[test]
    fn sub_second_lifetimes_round_up() {
        assert!(session_cookie("t", Duration::from_millis(500)).ends_with("Max-Age=1"));
        assert!(session_cookie("t", Duration::from_millis(1500)).ends_with("Max-Age=2"));
        assert!(session_cookie("", Duration::ZERO).ends_with("Max-Age=0"));
    }
}
