//! Signed, fixed-lifetime admin session tokens and their cookie transport.
//!
//! Token layout: `v1.<base64url(claims json)>.<base64url(hmac-sha256)>`, where the
//! MAC covers everything before the last dot. Expiry is absolute: 24 hours after
//! issuance, never extended.

use anyhow::{anyhow, bail, Result};
use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderValue};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE_NAME: &str = "gardi_session";
pub const SESSION_VALIDITY_HOURS: i64 = 24;
const TOKEN_PREFIX: &str = "v1";
const MAX_TOKEN_BYTES: usize = 2048;
const MAX_CLOCK_SKEW_SECONDS: i64 = 60;
const MIN_SECRET_BYTES: usize = 32;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
struct SessionClaims {
    sid: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// A verified session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub principal: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionAuthority {
    mac: HmacSha256,
    validity: Duration,
    clock: Arc<dyn Clock>,
    revoked: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl std::fmt::Debug for SessionAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthority")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl SessionAuthority {
    /// # Errors
    /// Returns an error if the signing secret is empty.
    pub fn new(secret: &SecretString, clock: Arc<dyn Clock>) -> Result<Self> {
        let len = secret.expose_secret().len();
        if len == 0 {
            bail!("session secret must not be empty");
        }
        if len < MIN_SECRET_BYTES {
            warn!("session secret is shorter than {MIN_SECRET_BYTES} bytes");
        }
        let mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| anyhow!("invalid session secret: {e}"))?;
        Ok(Self {
            mac,
            validity: Duration::hours(SESSION_VALIDITY_HOURS),
            clock,
            revoked: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Issue a new session for `principal`.
    pub fn issue(&self, principal: &str) -> Result<(Session, String)> {
        // Claims carry whole seconds; truncate so the returned session matches `verify`.
        let now = self.clock.now();
        let now = DateTime::<Utc>::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            principal: principal.to_string(),
            issued_at: now,
            expires_at: now + self.validity,
        };
        let claims = SessionClaims {
            sid: session.id.clone(),
            sub: session.principal.clone(),
            iat: session.issued_at.timestamp(),
            exp: session.expires_at.timestamp(),
        };

        let payload = serde_json::to_vec(&claims)?;
        let signed = format!("{TOKEN_PREFIX}.{}", Base64UrlUnpadded::encode_string(&payload));
        let mut mac = self.mac.clone();
        mac.update(signed.as_bytes());
        let signature = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok((session, format!("{signed}.{signature}")))
    }

    /// Verify a token. Any failure means "no session".
    pub fn verify(&self, token: &str) -> Option<Session> {
        if token.is_empty() || token.len() > MAX_TOKEN_BYTES {
            return None;
        }
        let (signed, signature) = token.rsplit_once('.')?;
        let (prefix, payload) = signed.split_once('.')?;
        if prefix != TOKEN_PREFIX {
            return None;
        }

        let signature = Base64UrlUnpadded::decode_vec(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(signed.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            debug!("session token signature mismatch");
            return None;
        }

        let payload = Base64UrlUnpadded::decode_vec(payload).ok()?;
        let claims: SessionClaims = serde_json::from_slice(&payload).ok()?;
        let issued_at = DateTime::<Utc>::from_timestamp(claims.iat, 0)?;
        let expires_at = issued_at + self.validity;
        if claims.exp != expires_at.timestamp() {
            return None;
        }

        let now = self.clock.now();
        if now >= expires_at {
            debug!("session token expired");
            return None;
        }
        if issued_at > now + Duration::seconds(MAX_CLOCK_SKEW_SECONDS) {
            return None;
        }
        if self.is_revoked(&claims.sid) {
            debug!("session token revoked");
            return None;
        }

        Some(Session {
            id: claims.sid,
            principal: claims.sub,
            issued_at,
            expires_at,
        })
    }

    /// Destroy a session before its natural expiry.
    pub fn revoke(&self, session: &Session) {
        let now = self.clock.now();
        let mut revoked = self.revoked.lock().unwrap_or_else(PoisonError::into_inner);
        revoked.retain(|_, expires_at| *expires_at > now);
        revoked.insert(session.id.clone(), session.expires_at);
    }

    fn is_revoked(&self, session_id: &str) -> bool {
        self.revoked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(session_id)
    }
}

/// Cookie attributes shared by every cookie this service sets.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub path: String,
    pub secure: bool,
}

impl CookiePolicy {
    fn build(&self, name: &str, value: &str, max_age: i64) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{name}={value}; Path={}; HttpOnly; SameSite=Strict; Max-Age={max_age}",
            self.path
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    pub(super) fn set(&self, name: &str, value: &str, ttl: Duration) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(name, value, ttl.num_seconds())
    }

    pub(super) fn clear(&self, name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(name, "", 0)
    }
}

/// Read a cookie value from the request headers.
pub(super) fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name && !val.trim().is_empty()).then(|| val.trim().to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use anyhow::Context;

    fn authority() -> Result<(Arc<ManualClock>, SessionAuthority)> {
        let clock = Arc::new(ManualClock::default());
        let secret = SecretString::from("0123456789abcdef0123456789abcdef".to_string());
        let authority = SessionAuthority::new(&secret, clock.clone())?;
        Ok((clock, authority))
    }

    #[test]
    fn issued_token_verifies_to_principal() -> Result<()> {
        let (clock, authority) = authority()?;
        let (issued, token) = authority.issue("admin")?;
        clock.advance(Duration::hours(23));
        let session = authority.verify(&token).context("token should verify")?;
        assert_eq!(session, issued);
        assert_eq!(session.principal, "admin");
        Ok(())
    }

    #[test]
    fn fractional_clock_yields_whole_second_session() -> Result<()> {
        let start = DateTime::<Utc>::from_timestamp(1_748_768_400, 987_654_321)
            .context("invalid start time")?;
        let clock = Arc::new(ManualClock::new(start));
        let secret = SecretString::from("0123456789abcdef0123456789abcdef".to_string());
        let authority = SessionAuthority::new(&secret, clock.clone())?;

        let (issued, token) = authority.issue("admin")?;
        assert_eq!(issued.issued_at.timestamp_subsec_nanos(), 0);
        assert_eq!(issued.expires_at - issued.issued_at, authority.validity());
        assert_eq!(authority.verify(&token), Some(issued.clone()));

        // Valid right up to the reported expiry, not a fraction earlier.
        clock.set(issued.expires_at - Duration::milliseconds(1));
        assert!(authority.verify(&token).is_some());
        clock.set(issued.expires_at);
        assert!(authority.verify(&token).is_none());
        Ok(())
    }

    #[test]
    fn expires_after_fixed_window() -> Result<()> {
        let (clock, authority) = authority()?;
        let (_, token) = authority.issue("admin")?;
        clock.advance(Duration::hours(SESSION_VALIDITY_HOURS));
        assert!(authority.verify(&token).is_none());
        Ok(())
    }

    #[test]
    fn rejects_tampered_tokens() -> Result<()> {
        let (_, authority) = authority()?;
        let (_, token) = authority.issue("admin")?;
        let (signed, signature) = token.rsplit_once('.').context("token layout")?;

        let forged_claims = SessionClaims {
            sid: "x".to_string(),
            sub: "root".to_string(),
            iat: 0,
            exp: 0,
        };
        let forged_payload =
            Base64UrlUnpadded::encode_string(&serde_json::to_vec(&forged_claims)?);
        let forged = format!("{TOKEN_PREFIX}.{forged_payload}.{signature}");

        assert!(authority.verify(&forged).is_none());
        assert!(authority.verify(&format!("{signed}.AAAA")).is_none());
        assert!(authority.verify(signed).is_none());
        assert!(authority.verify("").is_none());
        assert!(authority.verify("v2.a.b").is_none());
        Ok(())
    }

    #[test]
    fn other_secret_cannot_verify() -> Result<()> {
        let (clock, authority) = authority()?;
        let other = SessionAuthority::new(
            &SecretString::from("another-secret-another-secret-000".to_string()),
            clock,
        )?;
        let (_, token) = authority.issue("admin")?;
        assert!(other.verify(&token).is_none());
        Ok(())
    }

    #[test]
    fn revoked_session_is_absent() -> Result<()> {
        let (_, authority) = authority()?;
        let (session, token) = authority.issue("admin")?;
        let (_, other_token) = authority.issue("admin")?;
        authority.revoke(&session);
        assert!(authority.verify(&token).is_none());
        assert!(authority.verify(&other_token).is_some());
        Ok(())
    }

    #[test]
    fn empty_secret_is_rejected() {
        let clock = Arc::new(ManualClock::default());
        assert!(SessionAuthority::new(&SecretString::from(String::new()), clock).is_err());
    }

    #[test]
    fn cookie_policy_sets_flags() -> Result<()> {
        let policy = CookiePolicy {
            path: "/admin".to_string(),
            secure: true,
        };
        let value = policy.set(SESSION_COOKIE_NAME, "tok", Duration::hours(24))?;
        assert_eq!(
            value.to_str()?,
            "gardi_session=tok; Path=/admin; HttpOnly; SameSite=Strict; Max-Age=86400; Secure"
        );
        let cleared = policy.clear(SESSION_COOKIE_NAME)?;
        assert!(cleared.to_str()?.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn read_cookie_finds_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; gardi_session=abc.def.ghi"),
        );
        assert_eq!(
            read_cookie(&headers, SESSION_COOKIE_NAME),
            Some("abc.def.ghi".to_string())
        );
        assert_eq!(read_cookie(&headers, "missing"), None);
    }
}
