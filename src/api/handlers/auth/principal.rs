//! Principal resolution: turn request credentials into a caller identity.
//!
//! A bearer header always wins and its failures are terminal; the session
//! cookie is only consulted when no bearer value is present. Handlers gate
//! on [`require_auth`], which also enforces the CSRF header for
//! session-authenticated mutations.

use axum::http::{HeaderMap, Method, header::AUTHORIZATION};
use tracing::debug;
use uuid::Uuid;

use super::{
    csrf,
    error::AuthError,
    session::authenticate_session,
    state::AuthState,
    storage::{SessionRecord, TokenRecord},
    tokens::authenticate_token,
};

/// The caller identity derived from request credentials.
#[derive(Clone, Debug)]
pub(crate) enum Principal {
    /// No credential presented, or a session that no longer grants access.
    Anonymous,
    /// Cookie-authenticated browser session.
    Session {
        user_id: Uuid,
        session: SessionRecord,
    },
    /// Bearer-authenticated personal access token.
    Token { user_id: Uuid, token: TokenRecord },
}

impl Principal {
    pub(crate) fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Anonymous => None,
            Self::Session { user_id, .. } | Self::Token { user_id, .. } => Some(*user_id),
        }
    }
}

/// Resolve request credentials into a principal.
///
/// A session whose user has since been deactivated resolves to anonymous;
/// the session itself stays in storage and regains access if the user is
/// reactivated.
pub(crate) async fn resolve_principal(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<Principal, AuthError> {
    if let Some(bearer) = extract_bearer_token(headers) {
        let record = authenticate_token(state, &bearer).await?;
        return Ok(Principal::Token {
            user_id: record.user_id,
            token: record,
        });
    }

    let Some(record) = authenticate_session(headers, state).await? else {
        return Ok(Principal::Anonymous);
    };
    // Active status is checked live, not cached at session creation.
    if !state.store().user_is_active(record.user_id).await? {
        debug!(
            "Session for inactive user {} treated as anonymous",
            record.user_id
        );
        return Ok(Principal::Anonymous);
    }
    Ok(Principal::Session {
        user_id: record.user_id,
        session: record,
    })
}

/// Resolve and require an authenticated principal for a protected route.
///
/// Session credentials on unsafe methods must also carry the CSRF header.
/// Bearer tokens skip that check; cross-site requests cannot attach an
/// `Authorization` header.
pub(crate) async fn require_auth(
    headers: &HeaderMap,
    method: &Method,
    state: &AuthState,
) -> Result<Principal, AuthError> {
    let principal = resolve_principal(headers, state).await?;
    match &principal {
        Principal::Anonymous => return Err(AuthError::Unauthenticated),
        Principal::Session { session, .. } => {
            if csrf::is_unsafe_method(method)
                && !csrf::validate(&session.csrf_secret, csrf::extract_csrf_header(headers))
            {
                return Err(AuthError::CsrfMismatch);
            }
        }
        Principal::Token { .. } => {}
    }
    Ok(principal)
}

/// Convenience for handlers that only need the authenticated user id.
pub(super) async fn require_user_id(
    headers: &HeaderMap,
    method: &Method,
    state: &AuthState,
) -> Result<Uuid, AuthError> {
    let principal = require_auth(headers, method, state).await?;
    principal.user_id().ok_or(AuthError::Unauthenticated)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
