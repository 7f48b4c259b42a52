//! # Larder (Self-hosted Recipe Box API)
//!
//! `larder` is the API service behind a household's shared recipe box:
//! recipes, tags, books, shopping lists, and meal plans, served over HTTP to
//! the web UI and the `larder` command-line client.
//!
//! ## Authentication
//!
//! Browsers authenticate with an opaque, `HttpOnly` session cookie issued at
//! login. Sessions have a fixed lifetime set at creation; nothing extends
//! them. Mutating requests from a session must echo the script-readable CSRF
//! cookie in the `X-CSRF-Token` header (double-submit), so a forged
//! cross-site form post cannot pass the check.
//!
//! Scripted clients authenticate with personal access tokens
//! (`Authorization: Bearer larder_pat_...`). A token's secret is shown once
//! at creation and only its hash is stored; bearer requests skip the CSRF
//! check since a cross-site page cannot attach the header.
//!
//! ## Abuse protection
//!
//! Login and token-issuance endpoints sit behind per-key token buckets
//! (per client IP for login, per user for token issuance) that reject with
//! `429` before any password or secret hashing runs.
//!
//! ## Accounts
//!
//! The `users` table is provisioned out of band; this service only reads it.
//! Deactivating a user (`is_active = false`) takes effect on their very next
//! request: sessions and tokens are re-checked against the user row every
//! time they are presented.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
