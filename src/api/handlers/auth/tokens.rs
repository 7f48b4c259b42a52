//! Personal access token endpoints and bearer authentication.

use anyhow::Result;
use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, Method, StatusCode},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    error::AuthError,
    principal::require_user_id,
    rate_limit::{RateLimitDecision, RouteClass},
    state::AuthState,
    storage::TokenRecord,
    types::{TokenCreateRequest, TokenCreatedResponse, TokenResponse},
    utils::{generate_secret, hash_secret},
};

/// Prefix for personal access tokens, so leaked values are easy to classify.
pub(crate) const TOKEN_PREFIX: &str = "larder_pat_";

#[utoipa::path(
    post,
    path = "/v1/auth/tokens",
    request_body = TokenCreateRequest,
    responses(
        (status = 201, description = "Token created; the raw value appears only in this response", body = TokenCreatedResponse),
        (status = 400, description = "Missing name or invalid expiry"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "CSRF token mismatch"),
        (status = 429, description = "Token issuance rate exceeded"),
        (status = 500, description = "Internal error")
    ),
    tag = "auth"
)]
pub async fn create_token(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<TokenCreateRequest>>,
) -> impl IntoResponse {
    let user_id = match require_user_id(&headers, &Method::POST, &auth_state).await {
        Ok(user_id) => user_id,
        Err(err) => return err.into_response(),
    };

    // Issuance is keyed per user; per-address gating happens at login.
    let key = user_id.to_string();
    if auth_state.rate_limiter().allow(RouteClass::TokenIssue, &key) == RateLimitDecision::Limited {
        debug!(
            "Rate limited {} for user {user_id}",
            RouteClass::TokenIssue.as_str()
        );
        return AuthError::RateLimited.into_response();
    }

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    let name = request.name.trim();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token name").into_response();
    }
    let expires_at = match parse_expiry(request.expires_at.as_deref()) {
        Ok(expires_at) => expires_at,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };

    match issue_token(&auth_state, user_id, name, expires_at).await {
        Ok((record, token)) => (
            StatusCode::CREATED,
            Json(TokenCreatedResponse::new(&record, token)),
        )
            .into_response(),
        Err(err) => AuthError::Internal(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/tokens",
    responses(
        (status = 200, description = "Tokens owned by the caller, without secrets", body = [TokenResponse]),
        (status = 401, description = "Authentication required"),
        (status = 500, description = "Internal error")
    ),
    tag = "auth"
)]
pub async fn list_tokens(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let user_id = match require_user_id(&headers, &Method::GET, &auth_state).await {
        Ok(user_id) => user_id,
        Err(err) => return err.into_response(),
    };

    match auth_state.store().list_tokens(user_id).await {
        Ok(records) => {
            let tokens: Vec<TokenResponse> = records.iter().map(TokenResponse::from).collect();
            (StatusCode::OK, Json(tokens)).into_response()
        }
        Err(err) => AuthError::Internal(err).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/auth/tokens/{token_id}",
    params(
        ("token_id" = String, Path, description = "Token to revoke")
    ),
    responses(
        (status = 204, description = "Token revoked, or was already gone"),
        (status = 400, description = "Invalid token id"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "CSRF token mismatch"),
        (status = 500, description = "Internal error")
    ),
    tag = "auth"
)]
pub async fn revoke_token(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Path(token_id): Path<String>,
) -> impl IntoResponse {
    let user_id = match require_user_id(&headers, &Method::DELETE, &auth_state).await {
        Ok(user_id) => user_id,
        Err(err) => return err.into_response(),
    };

    let Ok(token_id) = Uuid::parse_str(&token_id) else {
        return (StatusCode::BAD_REQUEST, "Invalid token id").into_response();
    };

    // Revoking twice reports success both times.
    match auth_state.store().revoke_token(user_id, token_id).await {
        Ok(revoked) => {
            if !revoked {
                debug!("Revoke for unknown token {token_id} by user {user_id}");
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => AuthError::Internal(err).into_response(),
    }
}

/// Mint a new token for a user; returns the record and the raw value.
///
/// The raw value appears once in the create response; storage only ever
/// sees its hash.
pub(super) async fn issue_token(
    state: &AuthState,
    user_id: Uuid,
    name: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(TokenRecord, String)> {
    let token = format!("{TOKEN_PREFIX}{}", generate_secret()?);
    let token_hash = hash_secret(&token);
    let record = state
        .store()
        .create_token(user_id, name, &token_hash, expires_at)
        .await?;
    Ok((record, token))
}

/// Resolve a presented bearer value to a live token record.
///
/// Bearer failures are terminal; they never fall back to cookie auth.
pub(super) async fn authenticate_token(
    state: &AuthState,
    presented: &str,
) -> Result<TokenRecord, AuthError> {
    if !presented.starts_with(TOKEN_PREFIX) {
        return Err(AuthError::InvalidCredentials);
    }
    let token_hash = hash_secret(presented);
    let Some(record) = state.store().find_token_by_hash(&token_hash).await? else {
        return Err(AuthError::InvalidCredentials);
    };
    if record.expires_at.is_some_and(|at| at < Utc::now()) {
        debug!("Expired token presented for user {}", record.user_id);
        return Err(AuthError::ExpiredToken);
    }
    if !state.store().user_is_active(record.user_id).await? {
        debug!("Token presented for inactive user {}", record.user_id);
        return Err(AuthError::InactiveUser);
    }

    // Off the request path; a failed touch only costs bookkeeping.
    let store = Arc::clone(state.store());
    let token_id = record.id;
    tokio::spawn(async move {
        if let Err(err) = store.touch_token_last_used(token_id).await {
            warn!("Failed to update token last_used_at: {err}");
        }
    });

    Ok(record)
}

fn parse_expiry(value: Option<&str>) -> Result<Option<DateTime<Utc>>, &'static str> {
    let Some(value) = value else {
        return Ok(None);
    };
    let Ok(parsed) = DateTime::parse_from_rfc3339(value) else {
        return Err("Invalid expiry");
    };
    let parsed = parsed.with_timezone(&Utc);
    if parsed <= Utc::now() {
        return Err("Expiry must be in the future");
    }
    Ok(Some(parsed))
}
