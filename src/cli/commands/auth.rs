use clap::{Arg, ArgMatches, Command};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_NAME: &str = "session-cookie-name";
pub const ARG_CSRF_COOKIE_NAME: &str = "csrf-cookie-name";
pub const ARG_LOGIN_RATE_CAPACITY: &str = "login-rate-capacity";
pub const ARG_LOGIN_RATE_REFILL: &str = "login-rate-refill-per-minute";
pub const ARG_TOKEN_RATE_CAPACITY: &str = "token-rate-capacity";
pub const ARG_TOKEN_RATE_REFILL: &str = "token-rate-refill-per-minute";
pub const ARG_ARGON2_MEMORY_KIB: &str = "argon2-memory-kib";
pub const ARG_ARGON2_ITERATIONS: &str = "argon2-iterations";
pub const ARG_ARGON2_PARALLELISM: &str = "argon2-parallelism";
pub const ARG_SWEEP_INTERVAL_SECONDS: &str = "sweep-interval-seconds";

/// Auth settings collected from CLI flags and environment.
#[derive(Debug, Clone)]
pub struct Options {
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

impl Options {
    /// Collect auth arguments from matches. Every argument has a default, so
    /// this never fails.
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(43200),
            session_cookie_name: matches
                .get_one::<String>(ARG_SESSION_COOKIE_NAME)
                .cloned()
                .unwrap_or_else(|| "larder_session".to_string()),
            csrf_cookie_name: matches
                .get_one::<String>(ARG_CSRF_COOKIE_NAME)
                .cloned()
                .unwrap_or_else(|| "larder_csrf".to_string()),
            login_rate_capacity: matches
                .get_one::<u32>(ARG_LOGIN_RATE_CAPACITY)
                .copied()
                .unwrap_or(10),
            login_rate_refill_per_minute: matches
                .get_one::<f64>(ARG_LOGIN_RATE_REFILL)
                .copied()
                .unwrap_or(10.0),
            token_rate_capacity: matches
                .get_one::<u32>(ARG_TOKEN_RATE_CAPACITY)
                .copied()
                .unwrap_or(5),
            token_rate_refill_per_minute: matches
                .get_one::<f64>(ARG_TOKEN_RATE_REFILL)
                .copied()
                .unwrap_or(2.0),
            argon2_memory_kib: matches
                .get_one::<u32>(ARG_ARGON2_MEMORY_KIB)
                .copied()
                .unwrap_or(19456),
            argon2_iterations: matches
                .get_one::<u32>(ARG_ARGON2_ITERATIONS)
                .copied()
                .unwrap_or(2),
            argon2_parallelism: matches
                .get_one::<u32>(ARG_ARGON2_PARALLELISM)
                .copied()
                .unwrap_or(1),
            sweep_interval_seconds: matches
                .get_one::<u64>(ARG_SWEEP_INTERVAL_SECONDS)
                .copied()
                .unwrap_or(3600),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    let command = with_rate_limit_args(command);
    let command = with_argon2_args(command);
    with_sweeper_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL, used as the allowed CORS origin")
                .long_help(
                    "Frontend base URL, used as the allowed CORS origin. Cookies are marked Secure when this is an https:// URL.",
                )
                .env("LARDER_FRONTEND_BASE_URL")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds")
                .env("LARDER_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_NAME)
                .long(ARG_SESSION_COOKIE_NAME)
                .help("Name of the HttpOnly session cookie")
                .env("LARDER_SESSION_COOKIE_NAME")
                .default_value("larder_session"),
        )
        .arg(
            Arg::new(ARG_CSRF_COOKIE_NAME)
                .long(ARG_CSRF_COOKIE_NAME)
                .help("Name of the script-readable CSRF cookie")
                .env("LARDER_CSRF_COOKIE_NAME")
                .default_value("larder_csrf"),
        )
}

fn with_rate_limit_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOGIN_RATE_CAPACITY)
                .long(ARG_LOGIN_RATE_CAPACITY)
                .help("Login attempts allowed in a burst, per client address")
                .env("LARDER_LOGIN_RATE_CAPACITY")
                .default_value("10")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_LOGIN_RATE_REFILL)
                .long(ARG_LOGIN_RATE_REFILL)
                .help("Login attempts refilled per minute, per client address")
                .env("LARDER_LOGIN_RATE_REFILL_PER_MINUTE")
                .default_value("10.0")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new(ARG_TOKEN_RATE_CAPACITY)
                .long(ARG_TOKEN_RATE_CAPACITY)
                .help("Token creations allowed in a burst, per user")
                .env("LARDER_TOKEN_RATE_CAPACITY")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_TOKEN_RATE_REFILL)
                .long(ARG_TOKEN_RATE_REFILL)
                .help("Token creations refilled per minute, per user")
                .env("LARDER_TOKEN_RATE_REFILL_PER_MINUTE")
                .default_value("2.0")
                .value_parser(clap::value_parser!(f64)),
        )
}

fn with_argon2_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ARGON2_MEMORY_KIB)
                .long(ARG_ARGON2_MEMORY_KIB)
                .help("Argon2id memory cost in KiB")
                .env("LARDER_ARGON2_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ARGON2_ITERATIONS)
                .long(ARG_ARGON2_ITERATIONS)
                .help("Argon2id iteration count")
                .env("LARDER_ARGON2_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ARGON2_PARALLELISM)
                .long(ARG_ARGON2_PARALLELISM)
                .help("Argon2id parallelism (lanes)")
                .env("LARDER_ARGON2_PARALLELISM")
                .default_value("1")
                .value_parser(clap::value_parser!(u32)),
        )
}

fn with_sweeper_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_SWEEP_INTERVAL_SECONDS)
            .long(ARG_SWEEP_INTERVAL_SECONDS)
            .help("Interval between expired credential sweeps in seconds")
            .env("LARDER_SWEEP_INTERVAL_SECONDS")
            .default_value("3600")
            .value_parser(clap::value_parser!(u64)),
    )
}
