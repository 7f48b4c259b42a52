//! Error taxonomy for auth decisions.
//!
//! Every credential-class failure maps to the same client response so a
//! caller cannot tell a bad password from an expired token or a deactivated
//! account. The internal variants stay distinct for logging.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable credential on the request.
    #[error("authentication required")]
    Unauthenticated,
    /// Bad username/password pair or an unmatched token hash.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Bearer token matched but its expiry has passed.
    #[error("token expired")]
    ExpiredToken,
    /// Credential is structurally valid but the owning user is deactivated.
    #[error("user inactive")]
    InactiveUser,
    /// Session-authenticated unsafe request without a matching CSRF header.
    #[error("csrf token mismatch")]
    CsrfMismatch,
    /// Token bucket for the route/key pair is empty.
    #[error("rate limited")]
    RateLimited,
    /// Storage or other internal failure mid-decision; always denies.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated
            | Self::InvalidCredentials
            | Self::ExpiredToken
            | Self::InactiveUser => StatusCode::UNAUTHORIZED,
            Self::CsrfMismatch => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated
            | Self::InvalidCredentials
            | Self::ExpiredToken
            | Self::InactiveUser => "unauthorized",
            Self::CsrfMismatch => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("Auth decision failed: {err}");
        }
        (self.status(), Json(json!({ "code": self.code() }))).into_response()
    }
}
