use crate::{
    api::{handlers::admin::MAX_LOCKOUT_SECONDS, DEFAULT_ADMIN_PATH},
    store::asset::DEFAULT_MAX_BYTES,
};
use anyhow::{Context, Result};
use clap::{builder::BoolishValueParser, Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_ADMIN_PATH: &str = "admin-path";
pub const ARG_ADMIN_USERNAME: &str = "admin-username";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_MAX_FILE_SIZE: &str = "max-file-size";
pub const ARG_LOCKOUT_SECONDS: &str = "lockout-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_TRUST_PROXY: &str = "trust-proxy";

pub struct Options {
    pub path: String,
    pub username: String,
    pub password: SecretString,
    pub session_secret: SecretString,
    pub max_file_size: usize,
    pub lockout_seconds: i64,
    pub cookie_secure: bool,
    pub trust_proxy: bool,
}

impl Options {
    /// Read the administrative settings from validated matches.
    ///
    /// # Errors
    /// Returns an error if a required credential is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let username = matches
            .get_one::<String>(ARG_ADMIN_USERNAME)
            .cloned()
            .context("missing required argument: --admin-username")?;
        let password = matches
            .get_one::<String>(ARG_ADMIN_PASSWORD)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --admin-password")?;
        let session_secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --session-secret")?;

        Ok(Self {
            path: matches
                .get_one::<String>(ARG_ADMIN_PATH)
                .cloned()
                .unwrap_or_else(|| DEFAULT_ADMIN_PATH.to_string()),
            username,
            password,
            session_secret,
            max_file_size: matches
                .get_one::<usize>(ARG_MAX_FILE_SIZE)
                .copied()
                .unwrap_or(DEFAULT_MAX_BYTES),
            lockout_seconds: matches
                .get_one::<i64>(ARG_LOCKOUT_SECONDS)
                .copied()
                .unwrap_or(900),
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            trust_proxy: matches.get_flag(ARG_TRUST_PROXY),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_credential_args(command);
    command
        .arg(
            Arg::new(ARG_ADMIN_PATH)
                .long(ARG_ADMIN_PATH)
                .help("Path prefix of the administrative routes; \"/\" mounts them at the root")
                .env("GARDI_ADMIN_PATH")
                .default_value(DEFAULT_ADMIN_PATH),
        )
        .arg(
            Arg::new(ARG_MAX_FILE_SIZE)
                .long(ARG_MAX_FILE_SIZE)
                .help("Maximum icon size in bytes")
                .env("GARDI_MAX_FILE_SIZE")
                .default_value("102400")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_SECONDS)
                .long(ARG_LOCKOUT_SECONDS)
                .help("Lockout window in seconds after repeated failed logins")
                .env("GARDI_LOCKOUT_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_LOCKOUT_SECONDS)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark session cookies Secure (serve over HTTPS)")
                .env("GARDI_COOKIE_SECURE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_TRUST_PROXY)
                .long(ARG_TRUST_PROXY)
                .help("Identify clients by X-Forwarded-For / X-Real-IP")
                .long_help(
                    "Identify clients by X-Forwarded-For / X-Real-IP. Only enable behind a reverse proxy that overwrites these headers, otherwise clients can pick their own lockout key.",
                )
                .env("GARDI_TRUST_PROXY")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}

fn with_credential_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADMIN_USERNAME)
                .long(ARG_ADMIN_USERNAME)
                .help("Administrator username")
                .env("GARDI_ADMIN_USERNAME")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Administrator password: argon2 PHC string, or plaintext")
                .env("GARDI_ADMIN_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign session tokens and verification codes")
                .env("GARDI_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
}
