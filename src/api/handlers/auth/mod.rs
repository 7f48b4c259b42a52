//! Auth handlers and supporting modules.
//!
//! This module coordinates password login, cookie sessions, personal access
//! tokens, and the rate limits in front of both credential mints.
//!
//! ## Sessions and CSRF
//!
//! Logging in sets two cookies: an `HttpOnly` session cookie and a
//! script-readable CSRF cookie. Session-authenticated unsafe requests must
//! echo the CSRF value in `X-CSRF-Token`; a cross-site request cannot read
//! the cookie, so it can never produce a matching pair.
//!
//! ## Personal access tokens
//!
//! Tokens are prefixed `larder_pat_` and shown to the caller exactly once at
//! creation. Storage keeps SHA-256 hashes of session and token secrets, so a
//! database leak exposes no usable credentials.
//!
//! ## Rate limiting
//!
//! Logins are gated per client address and token issuance per user, through
//! in-process token buckets. The gates run before any password verification
//! work, so floods stay cheap to reject.

mod csrf;
pub(crate) mod error;
mod password;
pub(crate) mod principal;
mod rate_limit;
pub(crate) mod session;
mod state;
pub(crate) mod storage;
pub(crate) mod tokens;
pub(crate) mod types;
mod utils;

pub use password::{Argon2Costs, Argon2PasswordHasher, PasswordHasher};
pub use rate_limit::{NoopRateLimiter, RateLimitSettings, RouteLimit, TokenBucketLimiter};
pub use state::{AuthConfig, AuthState};

#[cfg(test)]
pub(crate) mod test_support;
