//! Auth configuration and shared request state.

use std::sync::Arc;

use super::password::{Argon2Costs, PasswordHasher};
use super::rate_limit::RateLimiter;
use super::storage::AuthStore;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_SESSION_COOKIE_NAME: &str = "larder_session";
const DEFAULT_CSRF_COOKIE_NAME: &str = "larder_csrf";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    session_cookie_name: String,
    csrf_cookie_name: String,
    argon2_costs: Argon2Costs,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
            csrf_cookie_name: DEFAULT_CSRF_COOKIE_NAME.to_string(),
            argon2_costs: Argon2Costs::default(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: String) -> Self {
        self.session_cookie_name = name;
        self
    }

    #[must_use]
    pub fn with_csrf_cookie_name(mut self, name: String) -> Self {
        self.csrf_cookie_name = name;
        self
    }

    #[must_use]
    pub fn with_argon2_costs(mut self, costs: Argon2Costs) -> Self {
        self.argon2_costs = costs;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(crate) fn argon2_costs(&self) -> Argon2Costs {
        self.argon2_costs
    }

    pub(super) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(super) fn session_cookie_name(&self) -> &str {
        &self.session_cookie_name
    }

    pub(super) fn csrf_cookie_name(&self) -> &str {
        &self.csrf_cookie_name
    }

    /// Only mark cookies `Secure` when the frontend is served over HTTPS.
    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    store: Arc<dyn AuthStore>,
    hasher: Arc<dyn PasswordHasher>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    pub(crate) fn new(
        config: AuthConfig,
        store: Arc<dyn AuthStore>,
        hasher: Arc<dyn PasswordHasher>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            config,
            store,
            hasher,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn store(&self) -> &Arc<dyn AuthStore> {
        &self.store
    }

    pub(super) fn hasher(&self) -> &dyn PasswordHasher {
        self.hasher.as_ref()
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, DEFAULT_SESSION_TTL_SECONDS};

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://larder.rocks".to_string());

        assert_eq!(config.frontend_base_url(), "https://larder.rocks");
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert_eq!(config.session_cookie_name(), "larder_session");
        assert_eq!(config.csrf_cookie_name(), "larder_csrf");
        assert_eq!(config.argon2_costs().memory_kib, 19456);

        let config = config
            .with_session_ttl_seconds(600)
            .with_session_cookie_name("box_session".to_string())
            .with_csrf_cookie_name("box_csrf".to_string());

        assert_eq!(config.session_ttl_seconds(), 600);
        assert_eq!(config.session_cookie_name(), "box_session");
        assert_eq!(config.csrf_cookie_name(), "box_csrf");
    }

    #[test]
    fn cookie_secure_follows_frontend_scheme() {
        let https = AuthConfig::new("https://larder.rocks".to_string());
        assert!(https.session_cookie_secure());

        let http = AuthConfig::new("http://localhost:5173".to_string());
        assert!(!http.session_cookie_secure());
    }
}
