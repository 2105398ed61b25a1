//! Admin configuration and the shared state handed to every admin handler.

use anyhow::{bail, Result};
use chrono::Duration;
use secrecy::SecretString;
use std::{path::PathBuf, sync::Arc};

use super::{
    credentials::CredentialVerifier,
    csrf::CsrfGuard,
    lockout::{LockoutTracker, DEFAULT_LOCKOUT_SECONDS, MAX_LOCKOUT_SECONDS},
    rate_limit::RateLimiter,
    session::{CookiePolicy, SessionAuthority},
    verification::VerificationCodes,
};
use crate::{
    clock::Clock,
    store::{asset::DEFAULT_MAX_BYTES, AssetReplacer, ConfigStore},
};

const DEFAULT_BASE_PATH: &str = "/admin";
const DEFAULT_CONFIG_PATH: &str = "data.json";
const DEFAULT_PUBLIC_DIR: &str = "public";

/// Normalize a mount path to `/segment` form; the root becomes the empty string.
pub(crate) fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[derive(Clone, Debug)]
pub struct AdminConfig {
    username: String,
    password: SecretString,
    session_secret: SecretString,
    base_path: String,
    config_path: PathBuf,
    public_dir: PathBuf,
    max_file_size: usize,
    lockout_seconds: i64,
    cookie_secure: bool,
    trust_proxy: bool,
}

impl AdminConfig {
    #[must_use]
    pub fn new(username: String, password: SecretString, session_secret: SecretString) -> Self {
        Self {
            username,
            password,
            session_secret,
            base_path: DEFAULT_BASE_PATH.to_string(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            max_file_size: DEFAULT_MAX_BYTES,
            lockout_seconds: DEFAULT_LOCKOUT_SECONDS,
            cookie_secure: false,
            trust_proxy: false,
        }
    }

    #[must_use]
    pub fn with_base_path(mut self, path: &str) -> Self {
        self.base_path = normalize_base_path(path);
        self
    }

    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    #[must_use]
    pub fn with_public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_max_file_size(mut self, bytes: usize) -> Self {
        self.max_file_size = bytes;
        self
    }

    #[must_use]
    pub fn with_lockout_seconds(mut self, seconds: i64) -> Self {
        self.lockout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Mount path of the admin routes, empty when mounted at the root.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    #[must_use]
    pub fn public_dir(&self) -> &PathBuf {
        &self.public_dir
    }

    #[must_use]
    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    #[must_use]
    pub fn lockout_seconds(&self) -> i64 {
        self.lockout_seconds
    }

    pub(super) fn trust_proxy(&self) -> bool {
        self.trust_proxy
    }

    /// Absolute path of an admin route, e.g. `route("login")`.
    pub(super) fn route(&self, name: &str) -> String {
        format!("{}/{name}", self.base_path)
    }

    pub(super) fn cookie_policy(&self) -> CookiePolicy {
        let path = if self.base_path.is_empty() {
            "/".to_string()
        } else {
            self.base_path.clone()
        };
        CookiePolicy {
            path,
            secure: self.cookie_secure,
        }
    }
}

pub struct AdminState {
    config: AdminConfig,
    lockout: LockoutTracker,
    credentials: CredentialVerifier,
    sessions: SessionAuthority,
    csrf: CsrfGuard,
    codes: VerificationCodes,
    store: ConfigStore,
    assets: AssetReplacer,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AdminState {
    /// Build every admin component from `config`.
    ///
    /// # Errors
    /// Returns an error when the credentials or the session secret are unusable, or
    /// the lockout window is out of range.
    pub fn new(
        config: AdminConfig,
        clock: Arc<dyn Clock>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self> {
        let credentials = CredentialVerifier::new(&config.username, &config.password)?;
        let sessions = SessionAuthority::new(&config.session_secret, clock.clone())?;
        let codes = VerificationCodes::new(&config.session_secret, clock.clone())?;
        if !(1..=MAX_LOCKOUT_SECONDS).contains(&config.lockout_seconds) {
            bail!(
                "lockout window must be between 1 and {MAX_LOCKOUT_SECONDS} seconds, got {}",
                config.lockout_seconds
            );
        }
        let lockout = LockoutTracker::new(Duration::seconds(config.lockout_seconds), clock.clone());
        let csrf = CsrfGuard::new(clock.clone());
        let store = ConfigStore::new(config.config_path.clone(), clock);
        let assets = AssetReplacer::new(config.public_dir.clone(), config.max_file_size);

        Ok(Self {
            config,
            lockout,
            credentials,
            sessions,
            csrf,
            codes,
            store,
            assets,
            rate_limiter,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub(super) fn lockout(&self) -> &LockoutTracker {
        &self.lockout
    }

    pub(super) fn credentials(&self) -> &CredentialVerifier {
        &self.credentials
    }

    pub(super) fn sessions(&self) -> &SessionAuthority {
        &self.sessions
    }

    pub(super) fn csrf(&self) -> &CsrfGuard {
        &self.csrf
    }

    pub(super) fn codes(&self) -> &VerificationCodes {
        &self.codes
    }

    pub(super) fn assets(&self) -> &AssetReplacer {
        &self.assets
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}
