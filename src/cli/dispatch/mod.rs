//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to an [`Action`], such as starting the API
//! server with its full configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::Result;

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if matches.subcommand_matches("hash-password").is_some() {
        return Ok(Action::HashPassword);
    }

    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?;

    let auth_opts = auth::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_base_url: auth_opts.frontend_base_url,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        session_cookie_name: auth_opts.session_cookie_name,
        csrf_cookie_name: auth_opts.csrf_cookie_name,
        login_rate_capacity: auth_opts.login_rate_capacity,
        login_rate_refill_per_minute: auth_opts.login_rate_refill_per_minute,
        token_rate_capacity: auth_opts.token_rate_capacity,
        token_rate_refill_per_minute: auth_opts.token_rate_refill_per_minute,
        argon2_memory_kib: auth_opts.argon2_memory_kib,
        argon2_iterations: auth_opts.argon2_iterations,
        argon2_parallelism: auth_opts.argon2_parallelism,
        sweep_interval_seconds: auth_opts.sweep_interval_seconds,
    }))
}
