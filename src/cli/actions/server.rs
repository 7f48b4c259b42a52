use crate::api;
use crate::api::handlers::auth::{Argon2Costs, AuthConfig, RateLimitSettings, RouteLimit};
use crate::api::sweeper::SweeperConfig;
use anyhow::Result;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub session_cookie_name: String,
    pub csrf_cookie_name: String,
    pub login_rate_capacity: u32,
    pub login_rate_refill_per_minute: f64,
    pub token_rate_capacity: u32,
    pub token_rate_refill_per_minute: f64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
    pub sweep_interval_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_session_cookie_name(args.session_cookie_name)
        .with_csrf_cookie_name(args.csrf_cookie_name)
        .with_argon2_costs(Argon2Costs {
            memory_kib: args.argon2_memory_kib,
            iterations: args.argon2_iterations,
            parallelism: args.argon2_parallelism,
        });

    let rate_settings = RateLimitSettings::new()
        .with_login(RouteLimit {
            capacity: args.login_rate_capacity,
            refill_per_minute: args.login_rate_refill_per_minute,
        })
        .with_token_issue(RouteLimit {
            capacity: args.token_rate_capacity,
            refill_per_minute: args.token_rate_refill_per_minute,
        });

    let sweeper_config = SweeperConfig::new().with_interval_seconds(args.sweep_interval_seconds);

    api::new(args.port, args.dsn, auth_config, rate_settings, sweeper_config).await
}
