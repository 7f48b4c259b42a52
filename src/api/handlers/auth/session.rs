//! Session endpoints for cookie login, logout, and introspection.

use anyhow::{Result, anyhow};
use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use super::{
    csrf,
    error::AuthError,
    principal::{Principal, resolve_principal},
    rate_limit::{RateLimitDecision, RouteClass},
    state::{AuthConfig, AuthState},
    storage::SessionRecord,
    types::{LoginRequest, SessionResponse},
    utils::{extract_client_ip, generate_secret, hash_secret, normalize_username},
};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 204, description = "Logged in; session and CSRF cookies set"),
        (status = 400, description = "Missing or malformed payload"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts from this address"),
        (status = 500, description = "Internal error")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    // The gate comes before any parsing or hashing so floods stay cheap.
    let key = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    if auth_state.rate_limiter().allow(RouteClass::Login, &key) == RateLimitDecision::Limited {
        debug!("Rate limited {} attempt from {key}", RouteClass::Login.as_str());
        return AuthError::RateLimited.into_response();
    }

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let username = normalize_username(&request.username);
    let user = match auth_state.store().find_user_by_username(&username).await {
        Ok(user) => user,
        Err(err) => return AuthError::Internal(err).into_response(),
    };

    // Unknown users still pay for a full verification so response timing
    // does not reveal whether the username exists.
    let verified = auth_state.hasher().verify_login(
        user.as_ref().map(|record| record.password_hash.as_str()),
        request.password.expose_secret(),
    );
    let Some(user) = user else {
        return AuthError::InvalidCredentials.into_response();
    };
    if !verified {
        return AuthError::InvalidCredentials.into_response();
    }
    if !user.is_active {
        debug!("Login attempt for inactive user {}", user.id);
        return AuthError::InactiveUser.into_response();
    }

    let (record, token) = match establish_session(&auth_state, user.id).await {
        Ok(established) => established,
        Err(err) => return AuthError::Internal(err).into_response(),
    };

    let mut response_headers = HeaderMap::new();
    match session_cookie(auth_state.config(), &token) {
        Ok(cookie) => {
            response_headers.append(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return AuthError::Internal(anyhow!("failed to build session cookie")).into_response();
        }
    }
    match csrf::csrf_cookie(auth_state.config(), &record.csrf_secret) {
        Ok(cookie) => {
            response_headers.append(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build CSRF cookie: {err}");
            return AuthError::Internal(anyhow!("failed to build CSRF cookie")).into_response();
        }
    }
    // Echoed in a header as well so non-browser clients skip cookie parsing.
    if let Ok(value) = HeaderValue::from_str(&record.csrf_secret) {
        response_headers.insert(csrf::CSRF_HEADER, value);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let cookie_name = auth_state.config().session_cookie_name();
    if let Some(token) = extract_session_cookie(&headers, cookie_name) {
        let token_hash = hash_secret(&token);
        // Logout is idempotent; it's fine if no rows are deleted.
        if let Err(err) = auth_state.store().delete_session(&token_hash).await {
            error!("Failed to delete session: {err}");
        }
    }

    // Always clear both cookies, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = csrf::clear_csrf_cookie(auth_state.config()) {
        response_headers.append(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Credential is active", body = SessionResponse),
        (status = 204, description = "No active credential"),
        (status = 401, description = "Invalid bearer token"),
        (status = 500, description = "Internal error")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    match resolve_principal(&headers, &auth_state).await {
        Ok(Principal::Session { user_id, session }) => {
            let response = SessionResponse {
                user_id: user_id.to_string(),
                kind: "session".to_string(),
                expires_at: Some(session.expires_at.to_rfc3339()),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(Principal::Token { user_id, token }) => {
            let response = SessionResponse {
                user_id: user_id.to_string(),
                kind: "token".to_string(),
                expires_at: token.expires_at.map(|at| at.to_rfc3339()),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(Principal::Anonymous) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

/// Mint a session for a user who already passed password verification.
///
/// Returns the stored record and the raw token for the cookie; only the
/// token's hash is persisted.
pub(super) async fn establish_session(
    state: &AuthState,
    user_id: Uuid,
) -> Result<(SessionRecord, String)> {
    let token = generate_secret()?;
    let token_hash = hash_secret(&token);
    let csrf_secret = csrf::issue_secret()?;
    let record = state
        .store()
        .create_session(
            user_id,
            &token_hash,
            &csrf_secret,
            state.config().session_ttl_seconds(),
        )
        .await?;
    Ok((record, token))
}

/// Resolve a session cookie into a live session record, if present.
///
/// Missing cookies, unknown hashes, and expired sessions all come back as
/// `Ok(None)`; only storage failures surface as errors.
pub(super) async fn authenticate_session(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<Option<SessionRecord>, AuthError> {
    let Some(token) = extract_session_cookie(headers, state.config().session_cookie_name()) else {
        return Ok(None);
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_secret(&token);
    let Some(record) = state.store().lookup_session(&token_hash).await? else {
        return Ok(None);
    };
    if record.expires_at < Utc::now() {
        debug!("Expired session presented for user {}", record.user_id);
        return Ok(None);
    }
    Ok(Some(record))
}

/// Build the `HttpOnly` cookie that carries the raw session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = config.session_cookie_name();
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie =
        format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = config.session_cookie_name();
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn extract_session_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let Some(val) = parts.next() else {
            continue;
        };
        if key == cookie_name {
            return Some(val.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    fn https_config() -> AuthConfig {
        AuthConfig::new("https://larder.rocks".to_string())
    }

    #[test]
    fn session_cookie_is_http_only_with_ttl() -> Result<()> {
        let cookie = session_cookie(&https_config(), "raw-token")?;
        let value = cookie.to_str().context("cookie header")?;

        assert!(value.starts_with("larder_session=raw-token;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=43200"));
        assert!(value.contains("Secure"));
        Ok(())
    }

    #[test]
    fn session_cookie_not_secure_on_http_frontend() -> Result<()> {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        let cookie = session_cookie(&config, "raw-token")?;
        assert!(!cookie.to_str().context("cookie header")?.contains("Secure"));
        Ok(())
    }

    #[test]
    fn clear_session_cookie_zeroes_max_age() -> Result<()> {
        let cookie = clear_session_cookie(&https_config())?;
        let value = cookie.to_str().context("cookie header")?;
        assert!(value.starts_with("larder_session=;"));
        assert!(value.contains("Max-Age=0"));
        assert!(value.contains("HttpOnly"));
        Ok(())
    }

    #[test]
    fn extract_session_cookie_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; larder_session=abc123 ; larder_csrf=xyz"),
        );
        assert_eq!(
            extract_session_cookie(&headers, "larder_session"),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn extract_session_cookie_ignores_other_names() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("larder_csrf=xyz"),
        );
        assert_eq!(extract_session_cookie(&headers, "larder_session"), None);
        assert_eq!(extract_session_cookie(&HeaderMap::new(), "larder_session"), None);
    }

    #[test]
    fn extract_session_cookie_skips_malformed_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("garbage; larder_session=abc123"),
        );
        assert_eq!(
            extract_session_cookie(&headers, "larder_session"),
            Some("abc123".to_string())
        );
    }
}
