//! Per-client login lockout.
//!
//! Flow Overview:
//! 1) `check` rejects a client with `threshold` failures whose last failure is
//!    inside the lockout window.
//! 2) Records whose window has elapsed are dropped lazily on `check`.
//! 3) `record_failure` bumps the counter; `clear` runs after a successful login.
//!
//! State is process-local and rebuilt from scratch on restart.

use chrono::{DateTime, Duration, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use crate::clock::Clock;

pub const FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_LOCKOUT_SECONDS: i64 = 15 * 60;
pub const MAX_LOCKOUT_SECONDS: i64 = 24 * 60 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct LockoutRecord {
    failures: u32,
    last_failure: DateTime<Utc>,
}

pub struct LockoutTracker {
    threshold: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<String, LockoutRecord>>,
}

impl LockoutTracker {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            threshold: FAILURE_THRESHOLD,
            window,
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, LockoutRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `false` while `client` is locked out.
    pub fn check(&self, client: &str) -> bool {
        let now = self.clock.now();
        let mut records = self.records();
        let Some(record) = records.get(client).copied() else {
            return true;
        };

        let elapsed = now.signed_duration_since(record.last_failure);
        if elapsed >= self.window {
            records.remove(client);
            return true;
        }

        record.failures < self.threshold
    }

    pub fn record_failure(&self, client: &str) {
        let now = self.clock.now();
        let mut records = self.records();
        let record = records.entry(client.to_string()).or_insert(LockoutRecord {
            failures: 0,
            last_failure: now,
        });
        record.failures = record.failures.saturating_add(1);
        record.last_failure = now;
    }

    pub fn clear(&self, client: &str) {
        self.records().remove(client);
    }

    /// Seconds until `client` may try again, zero when not locked.
    pub fn remaining_seconds(&self, client: &str) -> i64 {
        let now = self.clock.now();
        self.records()
            .get(client)
            .filter(|record| record.failures >= self.threshold)
            .map_or(0, |record| {
                let left = self.window - now.signed_duration_since(record.last_failure);
                left.num_seconds().max(0)
            })
    }
}
