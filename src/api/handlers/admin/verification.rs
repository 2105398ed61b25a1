//! Short-lived confirmation codes required on config updates.
//!
//! A code is a six digit TOTP (SHA-256, 300 second step) keyed per principal.
//! It supplements the CSRF token and is not a forgery control on its own.

use anyhow::{anyhow, Result};
use axum::{extract::Extension, http::HeaderMap, Json};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::sync::Arc;
use totp_rs::{Algorithm, TOTP};

use super::{
    error::AdminError, state::AdminState, types::VerificationCodeResponse, utils::require_session,
};
use crate::clock::Clock;

type HmacSha256 = Hmac<Sha256>;

pub const STEP_SECONDS: u64 = 300;
const DIGITS: usize = 6;
const SKEW: u8 = 1;
const DOMAIN: &[u8] = b"verification-code";

pub struct VerificationCodes {
    mac: HmacSha256,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for VerificationCodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationCodes").finish_non_exhaustive()
    }
}

impl VerificationCodes {
    /// # Errors
    /// Returns an error if the key is rejected by HMAC.
    pub fn new(secret: &SecretString, clock: Arc<dyn Clock>) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| anyhow!("invalid verification secret: {e}"))?;
        Ok(Self { mac, clock })
    }

    fn now(&self) -> u64 {
        u64::try_from(self.clock.now().timestamp()).unwrap_or_default()
    }

    /// Per-principal TOTP seeded from the session secret.
    fn totp(&self, principal: &str) -> Result<TOTP> {
        let mut mac = self.mac.clone();
        mac.update(DOMAIN);
        mac.update(b"|");
        mac.update(principal.as_bytes());
        let seed = mac.finalize().into_bytes().to_vec();

        TOTP::new(Algorithm::SHA256, DIGITS, SKEW, STEP_SECONDS, seed)
            .map_err(|e| anyhow!("TOTP init error: {e}"))
    }

    /// # Errors
    /// Returns an error if the TOTP cannot be built for the principal.
    pub fn code_for(&self, principal: &str) -> Result<String> {
        Ok(self.totp(principal)?.generate(self.now()))
    }

    /// Accepts the code of the current step or one step either side.
    pub fn verify(&self, principal: &str, code: &str) -> bool {
        let code = code.trim();
        let now = self.now();
        if code.len() != DIGITS || now < STEP_SECONDS {
            return false;
        }
        self.totp(principal).is_ok_and(|totp| totp.check(code, now))
    }
}

#[utoipa::path(
    get,
    path = "/verification-code",
    responses(
        (status = 200, description = "Code to submit with the next config update", body = VerificationCodeResponse),
        (status = 303, description = "No valid session, redirect to login")
    ),
    tag = "admin"
)]
pub async fn verification_code(
    headers: HeaderMap,
    admin_state: Extension<Arc<AdminState>>,
) -> Result<Json<VerificationCodeResponse>, AdminError> {
    let session = require_session(&admin_state, &headers)?;
    Ok(Json(VerificationCodeResponse {
        code: admin_state
            .codes()
            .code_for(&session.principal)
            .map_err(|e| AdminError::Storage(e.to_string()))?,
    }))
}
