//! Request/response types for auth endpoints.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::storage::TokenRecord;

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    /// Redacted in Debug output so request logging can never leak it.
    #[schema(value_type = String)]
    pub password: SecretString,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: String,
    /// Either `session` or `token`, depending on the credential presented.
    pub kind: String,
    pub expires_at: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct TokenCreateRequest {
    pub name: String,
    /// RFC 3339 timestamp; omit for a token that never expires.
    pub expires_at: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub last_used_at: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenCreatedResponse {
    /// The raw token. Shown here once; only a hash is stored.
    pub token: String,
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub expires_at: Option<String>,
}

impl From<&TokenRecord> for TokenResponse {
    fn from(record: &TokenRecord) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.name.clone(),
            created_at: record.created_at.to_rfc3339(),
            expires_at: record.expires_at.map(|at| at.to_rfc3339()),
            last_used_at: record.last_used_at.map(|at| at.to_rfc3339()),
        }
    }
}

impl TokenCreatedResponse {
    pub(crate) fn new(record: &TokenRecord, token: String) -> Self {
        Self {
            token,
            id: record.id.to_string(),
            name: record.name.clone(),
            created_at: record.created_at.to_rfc3339(),
            expires_at: record.expires_at.map(|at| at.to_rfc3339()),
        }
    }
}
