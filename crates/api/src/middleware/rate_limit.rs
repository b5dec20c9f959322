//! Per-user token bucket sized by role.
//!
//! A coarse guard against runaway clients. It is not part of the tenant
//! isolation guarantees and keeps no state across restarts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use spendgate_core::access::VerifiedIdentity;
use spendgate_core::identity::Role;
use spendgate_shared::config::RateLimitConfig;
use spendgate_shared::types::UserId;

use crate::AppState;
use crate::error::ApiError;

/// One token, in thousandths.
const TOKEN: u64 = 1000;

/// Any bucket untouched this long has refilled completely, so dropping it
/// is indistinguishable from keeping it.
const IDLE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Bucket {
    /// Remaining budget in thousandths of a request.
    milli_tokens: u64,
    refilled_at: Instant,
}

/// Token buckets keyed by user id.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<UserId, Bucket>,
    started: Instant,
    /// Milliseconds after `started` of the last idle sweep.
    swept_ms: AtomicU64,
}

impl RateLimiter {
    /// Creates a limiter with per-role budgets from configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
            started: Instant::now(),
            swept_ms: AtomicU64::new(0),
        }
    }

    /// Takes one request from the user's bucket.
    ///
    /// # Errors
    ///
    /// Returns the number of seconds until a request is available again.
    pub fn check(&self, user: UserId, role: Role) -> Result<(), u64> {
        self.check_at(user, role, Instant::now())
    }

    fn check_at(&self, user: UserId, role: Role, now: Instant) -> Result<(), u64> {
        if !self.config.enabled {
            return Ok(());
        }
        self.sweep_idle(now);
        let per_minute = u64::from(self.config.limit_for(role.as_str()).max(1));
        let capacity = per_minute * TOKEN;

        let mut bucket = self.buckets.entry(user).or_insert(Bucket {
            milli_tokens: capacity,
            refilled_at: now,
        });

        // per_minute tokens per 60_000 ms is per_minute milli-tokens per 60 ms
        let elapsed_ms = millis(now.saturating_duration_since(bucket.refilled_at));
        let refill = elapsed_ms.saturating_mul(per_minute) / 60;
        if refill > 0 {
            bucket.milli_tokens = bucket.milli_tokens.saturating_add(refill).min(capacity);
            bucket.refilled_at = now;
        }

        if bucket.milli_tokens >= TOKEN {
            bucket.milli_tokens -= TOKEN;
            return Ok(());
        }
        let missing = TOKEN - bucket.milli_tokens;
        let wait_ms = (missing * 60).div_ceil(per_minute);
        Err(Duration::from_millis(wait_ms).as_secs().max(1))
    }

    /// Drops idle buckets, at most once per idle window. Must not run while
    /// an entry guard is held.
    fn sweep_idle(&self, now: Instant) {
        let now_ms = millis(now.saturating_duration_since(self.started));
        let last = self.swept_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < millis(IDLE)
            || self
                .swept_ms
                .compare_exchange(last, now_ms, Ordering::Relaxed, Ordering::Relaxed)
                .is_err()
        {
            return;
        }
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.refilled_at) < IDLE);
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Applies the limiter to authenticated requests.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(identity) = request.extensions().get::<VerifiedIdentity>()
        && let Err(retry_after) = state.limiter.check(identity.user_id(), identity.role())
    {
        tracing::warn!(
            user_id = %identity.user_id(),
            role = identity.role().as_str(),
            retry_after,
            "rate limit exceeded"
        );
        return ApiError::rate_limited(retry_after).into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn limiter(per_minute: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            per_minute: HashMap::from([("kam".to_string(), per_minute)]),
            fallback_per_minute: 1,
        })
    }

    #[test]
    fn test_bucket_drains_then_refills() {
        let limiter = limiter(2);
        let user = UserId::new();
        let start = Instant::now();

        assert!(limiter.check_at(user, Role::Kam, start).is_ok());
        assert!(limiter.check_at(user, Role::Kam, start).is_ok());
        let retry = limiter.check_at(user, Role::Kam, start).unwrap_err();
        assert_eq!(retry, 30);

        let later = start + Duration::from_secs(30);
        assert!(limiter.check_at(user, Role::Kam, later).is_ok());
        assert!(limiter.check_at(user, Role::Kam, later).is_err());
    }

    #[test]
    fn test_buckets_are_per_user() {
        let limiter = limiter(1);
        let now = Instant::now();
        assert!(limiter.check_at(UserId::new(), Role::Kam, now).is_ok());
        assert!(limiter.check_at(UserId::new(), Role::Kam, now).is_ok());
    }

    #[test]
    fn test_idle_buckets_are_dropped() {
        let limiter = limiter(1);
        let start = Instant::now();
        let idle = UserId::new();
        let busy = UserId::new();

        assert!(limiter.check_at(idle, Role::Kam, start).is_ok());
        let half = start + Duration::from_secs(30);
        assert!(limiter.check_at(busy, Role::Kam, half).is_ok());
        assert_eq!(limiter.buckets.len(), 2);

        let later = start + Duration::from_secs(61);
        assert!(limiter.check_at(UserId::new(), Role::Kam, later).is_ok());
        assert!(!limiter.buckets.contains_key(&idle));
        assert!(limiter.buckets.contains_key(&busy));
        assert_eq!(limiter.buckets.len(), 2);

        // A drained bucket survives until it has refilled.
        assert!(limiter.check_at(busy, Role::Kam, later).is_err());
    }

    #[test]
    fn test_unknown_role_uses_fallback() {
        let limiter = limiter(100);
        let user = UserId::new();
        let now = Instant::now();
        assert!(limiter.check_at(user, Role::Analyst, now).is_ok());
        assert!(limiter.check_at(user, Role::Analyst, now).is_err());
    }

    #[test]
    fn test_disabled_limiter_passes() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        });
        let user = UserId::new();
        let now = Instant::now();
        for _ in 0..5000 {
            assert!(limiter.check_at(user, Role::SalesRep, now).is_ok());
        }
    }
}
