use crate::{
    api::{
        self,
        handlers::admin::{AdminConfig, AdminState, IpRateLimiter},
    },
    cli::telemetry,
    clock::SystemClock,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{path::PathBuf, sync::Arc};
use tracing::debug;

pub struct Args {
    pub port: u16,
    pub config_path: PathBuf,
    pub public_dir: PathBuf,
    pub admin_path: String,
    pub admin_username: String,
    pub admin_password: SecretString,
    pub session_secret: SecretString,
    pub max_file_size: usize,
    pub lockout_seconds: i64,
    pub cookie_secure: bool,
    pub trust_proxy: bool,
    pub cors_origins: Vec<String>,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("config_path", &self.config_path)
            .field("public_dir", &self.public_dir)
            .field("admin_path", &self.admin_path)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"***")
            .field("session_secret", &"***")
            .field("max_file_size", &self.max_file_size)
            .field("lockout_seconds", &self.lockout_seconds)
            .field("cookie_secure", &self.cookie_secure)
            .field("trust_proxy", &self.trust_proxy)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl Args {
    fn admin_config(self) -> (u16, Vec<String>, AdminConfig) {
        let config = AdminConfig::new(
            self.admin_username,
            self.admin_password,
            self.session_secret,
        )
        .with_base_path(&self.admin_path)
        .with_config_path(self.config_path)
        .with_public_dir(self.public_dir)
        .with_max_file_size(self.max_file_size)
        .with_lockout_seconds(self.lockout_seconds)
        .with_cookie_secure(self.cookie_secure)
        .with_trust_proxy(self.trust_proxy);
        (self.port, self.cors_origins, config)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the admin credentials or session secret are unusable, or the
/// server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let (port, cors_origins, config) = args.admin_config();
    let clock = Arc::new(SystemClock);
    let rate_limiter = Arc::new(IpRateLimiter::new(clock.clone()));
    let state = AdminState::new(config, clock, rate_limiter)
        .context("Failed to initialize admin state")?;

    let result = api::new(port, Arc::new(state), &cors_origins).await;

    telemetry::shutdown_tracer();

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            port: 3001,
            config_path: PathBuf::from("/srv/data.json"),
            public_dir: PathBuf::from("/srv/public"),
            admin_path: "/panel/".to_string(),
            admin_username: "admin".to_string(),
            admin_password: SecretString::from("hunter2".to_string()),
            session_secret: SecretString::from("signing-key".to_string()),
            max_file_size: 2048,
            lockout_seconds: 60,
            cookie_secure: true,
            trust_proxy: false,
            cors_origins: vec!["https://site.test".to_string()],
        }
    }

    #[test]
    fn debug_hides_secrets() {
        let rendered = format!("{:?}", args());
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("signing-key"));
        assert!(rendered.contains("admin"));
    }

    #[test]
    fn admin_config_carries_every_setting() {
        let (port, origins, config) = args().admin_config();
        assert_eq!(port, 3001);
        assert_eq!(origins, vec!["https://site.test".to_string()]);
        assert_eq!(config.username(), "admin");
        assert_eq!(config.base_path(), "/panel");
        assert_eq!(config.config_path(), &PathBuf::from("/srv/data.json"));
        assert_eq!(config.public_dir(), &PathBuf::from("/srv/public"));
        assert_eq!(config.max_file_size(), 2048);
        assert_eq!(config.lockout_seconds(), 60);
    }
}
