//! Token-bucket admission control for abuse-prone auth routes.
//!
//! Buckets are process-local. With several instances behind a balancer the
//! effective rate is multiplied by the instance count; a shared external
//! counter can replace [`TokenBucketLimiter`] behind the same trait if that
//! ever matters.

use dashmap::DashMap;
use std::time::{Duration, Instant};

const DEFAULT_LOGIN_CAPACITY: u32 = 10;
const DEFAULT_LOGIN_REFILL_PER_MINUTE: f64 = 10.0;
const DEFAULT_TOKEN_ISSUE_CAPACITY: u32 = 5;
const DEFAULT_TOKEN_ISSUE_REFILL_PER_MINUTE: f64 = 2.0;

/// Buckets idle for this long are dropped when a new key first shows up.
const BUCKET_IDLE_EVICTION: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// `POST /v1/auth/login`, keyed by client IP.
    Login,
    /// `POST /v1/auth/tokens`, keyed by authenticated user id.
    TokenIssue,
}

impl RouteClass {
    pub(super) const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::TokenIssue => "token_issue",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn allow(&self, class: RouteClass, key: &str) -> RateLimitDecision;
}

/// Burst capacity plus sustained refill for one route class.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteLimit {
    pub capacity: u32,
    pub refill_per_minute: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct RateLimitSettings {
    login: RouteLimit,
    token_issue: RouteLimit,
}

impl RateLimitSettings {
    #[must_use]
    pub fn new() -> Self {
        Self {
            login: RouteLimit {
                capacity: DEFAULT_LOGIN_CAPACITY,
                refill_per_minute: DEFAULT_LOGIN_REFILL_PER_MINUTE,
            },
            token_issue: RouteLimit {
                capacity: DEFAULT_TOKEN_ISSUE_CAPACITY,
                refill_per_minute: DEFAULT_TOKEN_ISSUE_REFILL_PER_MINUTE,
            },
        }
    }

    #[must_use]
    pub fn with_login(mut self, limit: RouteLimit) -> Self {
        self.login = limit;
        self
    }

    #[must_use]
    pub fn with_token_issue(mut self, limit: RouteLimit) -> Self {
        self.token_issue = limit;
        self
    }

    /// Clamp refill rates that make no sense (negative, NaN) to zero.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        self.login.refill_per_minute = sane_refill(self.login.refill_per_minute);
        self.token_issue.refill_per_minute = sane_refill(self.token_issue.refill_per_minute);
        self
    }

    #[must_use]
    pub fn login(&self) -> RouteLimit {
        self.login
    }

    #[must_use]
    pub fn token_issue(&self) -> RouteLimit {
        self.token_issue
    }

    fn limit_for(&self, class: RouteClass) -> RouteLimit {
        match class {
            RouteClass::Login => self.login,
            RouteClass::TokenIssue => self.token_issue,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self::new()
    }
}

fn sane_refill(refill_per_minute: f64) -> f64 {
    if refill_per_minute.is_finite() && refill_per_minute >= 0.0 {
        refill_per_minute
    } else {
        0.0
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    class: RouteClass,
    key: String,
}

struct Bucket {
    tokens: f64,
    last_refill_at: Instant,
}

/// Per-key token buckets over a sharded map.
///
/// Each `allow` is a read-modify-write under the entry's shard lock, so two
/// concurrent requests on the same key cannot both spend the last token.
pub struct TokenBucketLimiter {
    settings: RateLimitSettings,
    buckets: DashMap<BucketKey, Bucket>,
}

impl TokenBucketLimiter {
    #[must_use]
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings: settings.normalize(),
            buckets: DashMap::new(),
        }
    }

    fn allow_at(&self, class: RouteClass, key: &str, now: Instant) -> RateLimitDecision {
        let limit = self.settings.limit_for(class);
        if limit.capacity == 0 {
            return RateLimitDecision::Limited;
        }

        let bucket_key = BucketKey {
            class,
            key: key.to_string(),
        };
        // Evict idle buckets only when a new key arrives, and never while
        // holding an entry guard.
        if !self.buckets.contains_key(&bucket_key) {
            self.evict_idle(now);
        }

        let mut entry = self.buckets.entry(bucket_key).or_insert_with(|| Bucket {
            tokens: f64::from(limit.capacity),
            last_refill_at: now,
        });
        let elapsed = now.saturating_duration_since(entry.last_refill_at);
        let refill = elapsed.as_secs_f64() * limit.refill_per_minute / 60.0;
        entry.tokens = (entry.tokens + refill).min(f64::from(limit.capacity));
        entry.last_refill_at = now;

        if entry.tokens >= 1.0 {
            entry.tokens -= 1.0;
            RateLimitDecision::Allowed
        } else {
            RateLimitDecision::Limited
        }
    }

    fn evict_idle(&self, now: Instant) {
        self.buckets.retain(|_, bucket| {
            now.saturating_duration_since(bucket.last_refill_at) < BUCKET_IDLE_EVICTION
        });
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn allow(&self, class: RouteClass, key: &str) -> RateLimitDecision {
        self.allow_at(class, key, Instant::now())
    }
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn allow(&self, _class: RouteClass, _key: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(capacity: u32, refill_per_minute: f64) -> RateLimitSettings {
        RateLimitSettings::new().with_login(RouteLimit {
            capacity,
            refill_per_minute,
        })
    }

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(
            limiter.allow(RouteClass::Login, "1.2.3.4"),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.allow(RouteClass::TokenIssue, "user"),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn burst_stops_at_capacity() {
        let limiter = TokenBucketLimiter::new(settings(3, 0.0));
        let now = Instant::now();
        for _ in 0..3 {
            assert_eq!(
                limiter.allow_at(RouteClass::Login, "1.2.3.4", now),
                RateLimitDecision::Allowed
            );
        }
        assert_eq!(
            limiter.allow_at(RouteClass::Login, "1.2.3.4", now),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn tokens_never_go_negative() {
        let limiter = TokenBucketLimiter::new(settings(1, 0.0));
        let now = Instant::now();
        let _ = limiter.allow_at(RouteClass::Login, "1.2.3.4", now);
        let _ = limiter.allow_at(RouteClass::Login, "1.2.3.4", now);
        let _ = limiter.allow_at(RouteClass::Login, "1.2.3.4", now);

        let key = BucketKey {
            class: RouteClass::Login,
            key: "1.2.3.4".to_string(),
        };
        let tokens = limiter.buckets.get(&key).map(|bucket| bucket.tokens);
        assert_eq!(tokens, Some(0.0));
    }

    #[test]
    fn refill_restores_proportionally() {
        // 2 tokens/minute: after 30s exactly one more request fits.
        let limiter = TokenBucketLimiter::new(settings(1, 2.0));
        let start = Instant::now();
        assert_eq!(
            limiter.allow_at(RouteClass::Login, "1.2.3.4", start),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.allow_at(RouteClass::Login, "1.2.3.4", start),
            RateLimitDecision::Limited
        );

        let later = start + Duration::from_secs(30);
        assert_eq!(
            limiter.allow_at(RouteClass::Login, "1.2.3.4", later),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.allow_at(RouteClass::Login, "1.2.3.4", later),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn refill_caps_at_capacity() {
        let limiter = TokenBucketLimiter::new(settings(2, 60.0));
        let start = Instant::now();
        let _ = limiter.allow_at(RouteClass::Login, "1.2.3.4", start);

        // An hour of refill still yields at most `capacity` approvals.
        let later = start + Duration::from_secs(3600);
        for _ in 0..2 {
            assert_eq!(
                limiter.allow_at(RouteClass::Login, "1.2.3.4", later),
                RateLimitDecision::Allowed
            );
        }
        assert_eq!(
            limiter.allow_at(RouteClass::Login, "1.2.3.4", later),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn capacity_zero_rejects_everything() {
        let limiter = TokenBucketLimiter::new(settings(0, 10.0));
        let now = Instant::now();
        assert_eq!(
            limiter.allow_at(RouteClass::Login, "1.2.3.4", now),
            RateLimitDecision::Limited
        );
        assert_eq!(
            limiter.allow_at(RouteClass::Login, "1.2.3.4", now),
            RateLimitDecision::Limited
        );
        assert!(limiter.buckets.is_empty());
    }

    #[test]
    fn keys_and_classes_are_independent() {
        let limiter = TokenBucketLimiter::new(
            RateLimitSettings::new()
                .with_login(RouteLimit {
                    capacity: 1,
                    refill_per_minute: 0.0,
                })
                .with_token_issue(RouteLimit {
                    capacity: 1,
                    refill_per_minute: 0.0,
                }),
        );
        let now = Instant::now();
        assert_eq!(
            limiter.allow_at(RouteClass::Login, "1.2.3.4", now),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.allow_at(RouteClass::Login, "5.6.7.8", now),
            RateLimitDecision::Allowed
        );
        // Same key string, different route class: separate bucket.
        assert_eq!(
            limiter.allow_at(RouteClass::TokenIssue, "1.2.3.4", now),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.allow_at(RouteClass::Login, "1.2.3.4", now),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn idle_buckets_evicted_on_new_key() {
        let limiter = TokenBucketLimiter::new(settings(1, 0.0));
        let start = Instant::now();
        let _ = limiter.allow_at(RouteClass::Login, "stale", start);
        assert_eq!(limiter.buckets.len(), 1);

        let later = start + BUCKET_IDLE_EVICTION + Duration::from_secs(1);
        let _ = limiter.allow_at(RouteClass::Login, "fresh", later);

        let stale_key = BucketKey {
            class: RouteClass::Login,
            key: "stale".to_string(),
        };
        assert!(!limiter.buckets.contains_key(&stale_key));
        assert_eq!(limiter.buckets.len(), 1);

        // A re-seen key starts from a fresh, full bucket.
        assert_eq!(
            limiter.allow_at(RouteClass::Login, "stale", later),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn normalize_clamps_bad_refill() {
        let normalized = settings(5, -3.0).normalize();
        assert_eq!(normalized.login().refill_per_minute, 0.0);

        let normalized = settings(5, f64::NAN).normalize();
        assert_eq!(normalized.login().refill_per_minute, 0.0);

        let normalized = settings(5, 7.5).normalize();
        assert_eq!(normalized.login().refill_per_minute, 7.5);
    }

    #[test]
    fn settings_defaults() {
        let settings = RateLimitSettings::default();
        assert_eq!(settings.login().capacity, DEFAULT_LOGIN_CAPACITY);
        assert_eq!(
            settings.token_issue().refill_per_minute,
            DEFAULT_TOKEN_ISSUE_REFILL_PER_MINUTE
        );
    }

    #[test]
    fn route_class_names() {
        assert_eq!(RouteClass::Login.as_str(), "login");
        assert_eq!(RouteClass::TokenIssue.as_str(), "token_issue");
    }
}
