//! Admin credential verification.
//!
//! The reference secret is an argon2 PHC string, a bcrypt hash (`$2a$`, `$2b$`,
//! `$2y$`) or, as a discouraged fallback, plaintext. Callers only see `verify`.

use anyhow::{anyhow, bail, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

enum ReferenceSecret {
    /// Validated PHC string.
    Argon2(String),
    Bcrypt(String),
    Plain(SecretString),
}

/// Cheap to clone so verification can move onto a blocking thread.
#[derive(Clone)]
pub struct CredentialVerifier {
    username: Arc<str>,
    secret: Arc<ReferenceSecret>,
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("username", &self.username)
            .field("hashed", &self.is_hashed())
            .finish()
    }
}

fn is_bcrypt(value: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| value.starts_with(prefix))
}

/// Hash a password into an argon2id PHC string suitable for `--admin-password`.
///
/// # Errors
/// Returns an error if salt generation or hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| anyhow!("failed to generate salt: {e}"))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!("invalid salt: {e}"))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

impl CredentialVerifier {
    /// Build a verifier from the configured username and reference secret.
    ///
    /// # Errors
    /// Returns an error when the username or the secret is empty, or when a
    /// reference hash does not parse.
    pub fn new(username: &str, reference: &SecretString) -> Result<Self> {
        let username = username.trim();
        if username.is_empty() {
            bail!("admin username must not be empty");
        }
        let raw = reference.expose_secret();
        if raw.is_empty() {
            bail!("admin password must not be empty");
        }

        let secret = if raw.starts_with("$argon2") {
            PasswordHash::new(raw).map_err(|e| anyhow!("invalid argon2 admin password: {e}"))?;
            ReferenceSecret::Argon2(raw.to_string())
        } else if is_bcrypt(raw) {
            raw.parse::<bcrypt::HashParts>()
                .map_err(|e| anyhow!("invalid bcrypt admin password: {e}"))?;
            ReferenceSecret::Bcrypt(raw.to_string())
        } else {
            warn!("admin password is configured in plaintext; store an argon2 hash instead");
            ReferenceSecret::Plain(reference.clone())
        };

        Ok(Self {
            username: Arc::from(username),
            secret: Arc::new(secret),
        })
    }

    #[must_use]
    pub fn is_hashed(&self) -> bool {
        !matches!(*self.secret, ReferenceSecret::Plain(_))
    }

    /// Check a submitted username/password pair. Hashed references are slow on
    /// purpose, call this off the async workers.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        if username != &*self.username {
            return false;
        }
        match &*self.secret {
            ReferenceSecret::Argon2(phc) => PasswordHash::new(phc).is_ok_and(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            }),
            ReferenceSecret::Bcrypt(hash) => bcrypt::verify(password, hash).unwrap_or(false),
            ReferenceSecret::Plain(expected) => password
                .as_bytes()
                .ct_eq(expected.expose_secret().as_bytes())
                .into(),
        }
    }
}
