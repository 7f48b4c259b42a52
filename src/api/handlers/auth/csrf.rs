//! CSRF double-submit guard for session-authenticated mutations.
//!
//! Each session gets one CSRF secret at creation, delivered in a
//! script-readable cookie. The client echoes it in `X-CSRF-Token` on unsafe
//! requests; a forged cross-site request cannot read the cookie, so it
//! cannot supply a matching header. Bearer requests never hit this check.

use anyhow::Result;
use axum::http::{
    HeaderMap, HeaderValue, Method,
    header::InvalidHeaderValue,
};

use super::state::AuthConfig;
use super::utils::{constant_time_eq, generate_secret};

pub(super) const CSRF_HEADER: &str = "x-csrf-token";

/// Create the per-session CSRF secret.
pub(super) fn issue_secret() -> Result<String> {
    generate_secret()
}

/// Methods that mutate state and therefore require the CSRF header.
pub(super) fn is_unsafe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Exact, constant-time match of the presented header against the session
/// secret. Missing header, case differences, and truncation all fail.
pub(super) fn validate(csrf_secret: &str, presented: Option<&str>) -> bool {
    presented.is_some_and(|value| constant_time_eq(value, csrf_secret))
}

pub(super) fn extract_csrf_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(CSRF_HEADER)?.to_str().ok()
}

/// Build the script-readable CSRF cookie, same lifetime as the session.
pub(super) fn csrf_cookie(
    config: &AuthConfig,
    secret: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = config.csrf_cookie_name();
    let ttl_seconds = config.session_ttl_seconds();
    // No HttpOnly: the frontend must read this value to echo it back.
    let mut cookie = format!("{name}={secret}; Path=/; SameSite=Lax; Max-Age={ttl_seconds}");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_csrf_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = config.csrf_cookie_name();
    let mut cookie = format!("{name}=; Path=/; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
