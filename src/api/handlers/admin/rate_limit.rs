//! Per-client request throttling for admin flows.
//!
//! Flow Overview:
//! 1) `check_ip` registers an attempt in a rolling window keyed by client and
//!    action, and refuses once the window is full.
//! 2) Attempts are registered pessimistically. Login calls `record_success` to
//!    withdraw its attempt, so only failed logins spend the login budget.
//! 3) Windows are pruned lazily on every check.
//!
//! State is process-local. Deployments with several replicas can plug in a
//! shared implementation of [`RateLimiter`].

use chrono::{DateTime, Duration, Utc};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::debug;

use crate::clock::Clock;

/// Key used when the client address is unknown.
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Login,
    ConfigUpdate,
    AssetUpload,
}

impl RateLimitAction {
    pub const ALL: [Self; 3] = [Self::Login, Self::ConfigUpdate, Self::AssetUpload];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::ConfigUpdate => "config_update",
            Self::AssetUpload => "favicon_upload",
        }
    }

    /// 5 login failures per 15 minutes; mutating routes share the site-wide
    /// budget of 1000 requests per 15 minutes.
    #[must_use]
    pub fn default_limit(self) -> RateLimit {
        match self {
            Self::Login => RateLimit::new(5, Duration::minutes(15)),
            Self::ConfigUpdate | Self::AssetUpload => RateLimit::new(1000, Duration::minutes(15)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    pub max: usize,
    pub window: Duration,
}

impl RateLimit {
    #[must_use]
    pub fn new(max: usize, window: Duration) -> Self {
        Self { max, window }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after: i64 },
}

pub trait RateLimiter: Send + Sync {
    /// Register an attempt for `ip` and decide whether it may proceed.
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision;

    /// Withdraw the attempt registered by the last allowed `check_ip`.
    fn record_success(&self, _ip: Option<&str>, _action: RateLimitAction) {}
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

type AttemptKey = (String, RateLimitAction);

pub struct IpRateLimiter {
    clock: Arc<dyn Clock>,
    limits: HashMap<RateLimitAction, RateLimit>,
    attempts: Mutex<HashMap<AttemptKey, VecDeque<DateTime<Utc>>>>,
}

impl std::fmt::Debug for IpRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpRateLimiter")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl IpRateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            limits: RateLimitAction::ALL
                .iter()
                .map(|action| (*action, action.default_limit()))
                .collect(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_limit(mut self, action: RateLimitAction, limit: RateLimit) -> Self {
        self.limits.insert(action, limit);
        self
    }

    #[must_use]
    pub fn limit(&self, action: RateLimitAction) -> RateLimit {
        self.limits
            .get(&action)
            .copied()
            .unwrap_or_else(|| action.default_limit())
    }

    fn attempts(&self) -> MutexGuard<'_, HashMap<AttemptKey, VecDeque<DateTime<Utc>>>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(ip: Option<&str>, action: RateLimitAction) -> AttemptKey {
        (ip.unwrap_or(UNKNOWN_CLIENT).to_string(), action)
    }

    /// Number of clients with attempts still inside their window.
    pub fn tracked(&self) -> usize {
        self.attempts().len()
    }
}

impl RateLimiter for IpRateLimiter {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision {
        let now = self.clock.now();
        let mut attempts = self.attempts();
        attempts.retain(|(_, kind), window| {
            let limit = self.limit(*kind);
            while window
                .front()
                .is_some_and(|at| now.signed_duration_since(*at) >= limit.window)
            {
                window.pop_front();
            }
            !window.is_empty()
        });

        let limit = self.limit(action);
        let window = attempts.entry(Self::key(ip, action)).or_default();
        if window.len() >= limit.max {
            let retry_after = window
                .front()
                .map_or(limit.window, |oldest| {
                    limit.window - now.signed_duration_since(*oldest)
                })
                .num_seconds()
                .max(1);
            debug!(action = action.as_str(), retry_after, "rate limit reached");
            return RateLimitDecision::Limited { retry_after };
        }
        window.push_back(now);
        RateLimitDecision::Allowed
    }

    fn record_success(&self, ip: Option<&str>, action: RateLimitAction) {
        let key = Self::key(ip, action);
        let mut attempts = self.attempts();
        if let Some(window) = attempts.get_mut(&key) {
            window.pop_back();
            if window.is_empty() {
                attempts.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const CLIENT: Option<&str> = Some("203.0.113.7");

    fn limiter() -> (Arc<ManualClock>, IpRateLimiter) {
        let clock = Arc::new(ManualClock::default());
        (clock.clone(), IpRateLimiter::new(clock))
    }

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(
            limiter.check_ip(None, RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        limiter.record_success(CLIENT, RateLimitAction::Login);
        assert_eq!(
            limiter.check_ip(CLIENT, RateLimitAction::AssetUpload),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn login_allows_five_attempts_per_window() {
        let (clock, limiter) = limiter();
        for _ in 0..5 {
            assert_eq!(
                limiter.check_ip(CLIENT, RateLimitAction::Login),
                RateLimitDecision::Allowed
            );
        }
        assert_eq!(
            limiter.check_ip(CLIENT, RateLimitAction::Login),
            RateLimitDecision::Limited { retry_after: 900 }
        );

        clock.advance(Duration::minutes(10));
        assert_eq!(
            limiter.check_ip(CLIENT, RateLimitAction::Login),
            RateLimitDecision::Limited { retry_after: 300 }
        );

        clock.advance(Duration::minutes(5));
        assert_eq!(
            limiter.check_ip(CLIENT, RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn successful_logins_do_not_count() {
        let (_, limiter) = limiter();
        for _ in 0..20 {
            assert_eq!(
                limiter.check_ip(CLIENT, RateLimitAction::Login),
                RateLimitDecision::Allowed
            );
            limiter.record_success(CLIENT, RateLimitAction::Login);
        }
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn clients_and_actions_have_separate_budgets() {
        let (_, limiter) = limiter();
        let limiter = limiter.with_limit(
            RateLimitAction::ConfigUpdate,
            RateLimit::new(1, Duration::minutes(1)),
        );
        assert_eq!(
            limiter.check_ip(CLIENT, RateLimitAction::ConfigUpdate),
            RateLimitDecision::Allowed
        );
        assert!(matches!(
            limiter.check_ip(CLIENT, RateLimitAction::ConfigUpdate),
            RateLimitDecision::Limited { .. }
        ));
        assert_eq!(
            limiter.check_ip(Some("198.51.100.1"), RateLimitAction::ConfigUpdate),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(CLIENT, RateLimitAction::AssetUpload),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn expired_windows_are_dropped() {
        let (clock, limiter) = limiter();
        for n in 0..50 {
            let ip = format!("192.0.2.{n}");
            limiter.check_ip(Some(&ip), RateLimitAction::Login);
        }
        assert_eq!(limiter.tracked(), 50);
        clock.advance(Duration::minutes(15));
        limiter.check_ip(CLIENT, RateLimitAction::Login);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn default_limits_match_actions() {
        let (_, limiter) = limiter();
        assert_eq!(
            limiter.limit(RateLimitAction::Login),
            RateLimit::new(5, Duration::minutes(15))
        );
        assert_eq!(limiter.limit(RateLimitAction::AssetUpload).max, 1000);
    }
}
