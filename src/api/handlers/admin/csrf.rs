//! Anti-forgery tokens bound to a session or, before login, to an anonymous
//! context cookie.
//!
//! Only the most recently issued token for a binding validates. Issuing a new
//! token for the same binding invalidates the previous one. Anonymous bindings
//! are capped; once full, the oldest one is evicted.

use anyhow::{anyhow, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use subtle::ConstantTimeEq;

use crate::clock::Clock;

pub const CSRF_COOKIE_NAME: &str = "gardi_csrf";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";
pub const CSRF_FORM_FIELD: &str = "_csrf";
const TOKEN_BYTES: usize = 32;
const TOKEN_TTL_HOURS: i64 = 24;
pub const MAX_ANONYMOUS_BINDINGS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CsrfBinding {
    Session(String),
    Anonymous(String),
}

impl CsrfBinding {
    fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous(_))
    }

    fn key(&self) -> String {
        match self {
            Self::Session(id) => format!("s:{id}"),
            Self::Anonymous(id) => format!("a:{id}"),
        }
    }
}

struct IssuedToken {
    token: String,
    issued_at: DateTime<Utc>,
    anonymous: bool,
}

pub struct CsrfGuard {
    ttl: Duration,
    max_anonymous: usize,
    clock: Arc<dyn Clock>,
    tokens: Mutex<HashMap<String, IssuedToken>>,
}

impl std::fmt::Debug for CsrfGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfGuard")
            .field("ttl", &self.ttl)
            .field("max_anonymous", &self.max_anonymous)
            .finish_non_exhaustive()
    }
}

/// 32 random bytes, base64url without padding.
pub(crate) fn random_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| anyhow!("failed to generate random token: {e}"))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

impl CsrfGuard {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: Duration::hours(TOKEN_TTL_HOURS),
            max_anonymous: MAX_ANONYMOUS_BINDINGS,
            clock,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_anonymous_limit(mut self, limit: usize) -> Self {
        self.max_anonymous = limit.max(1);
        self
    }

    /// Issue a fresh token for `binding`, replacing any earlier one.
    ///
    /// # Errors
    /// Returns an error if the system random source fails.
    pub fn issue(&self, binding: &CsrfBinding) -> Result<String> {
        let token = random_token()?;
        let now = self.clock.now();
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens.retain(|_, issued| now.signed_duration_since(issued.issued_at) < self.ttl);

        let key = binding.key();
        if binding.is_anonymous() && !tokens.contains_key(&key) {
            let anonymous = tokens.values().filter(|issued| issued.anonymous).count();
            if anonymous >= self.max_anonymous {
                let oldest = tokens
                    .iter()
                    .filter(|(_, issued)| issued.anonymous)
                    .min_by_key(|(_, issued)| issued.issued_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    tokens.remove(&oldest);
                }
            }
        }

        tokens.insert(
            key,
            IssuedToken {
                token: token.clone(),
                issued_at: now,
                anonymous: binding.is_anonymous(),
            },
        );
        Ok(token)
    }

    /// Number of live bindings, expired ones included until the next issue.
    pub fn len(&self) -> usize {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` only for the latest unexpired token issued to `binding`.
    pub fn validate(&self, binding: &CsrfBinding, presented: &str) -> bool {
        if presented.is_empty() {
            return false;
        }
        let now = self.clock.now();
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens.get(&binding.key()).is_some_and(|issued| {
            now.signed_duration_since(issued.issued_at) < self.ttl
                && bool::from(issued.token.as_bytes().ct_eq(presented.as_bytes()))
        })
    }

    pub fn discard(&self, binding: &CsrfBinding) {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&binding.key());
    }
}
