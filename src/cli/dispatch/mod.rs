//! Command-line argument dispatch.
//!
//! Settings are read here exactly once and handed to the server action; nothing
//! downstream looks at the environment.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{admin, ARG_CONFIG_PATH, ARG_CORS_ORIGIN, ARG_PORT, ARG_PUBLIC_DIR};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(3001);
    let config_path = matches
        .get_one::<String>(ARG_CONFIG_PATH)
        .map(PathBuf::from)
        .context("missing required argument: --config-path")?;
    let public_dir = matches
        .get_one::<String>(ARG_PUBLIC_DIR)
        .map(PathBuf::from)
        .context("missing required argument: --public-dir")?;
    let cors_origins = matches
        .get_many::<String>(ARG_CORS_ORIGIN)
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let admin_opts = admin::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        config_path,
        public_dir,
        admin_path: admin_opts.path,
        admin_username: admin_opts.username,
        admin_password: admin_opts.password,
        session_secret: admin_opts.session_secret,
        max_file_size: admin_opts.max_file_size,
        lockout_seconds: admin_opts.lockout_seconds,
        cookie_secure: admin_opts.cookie_secure,
        trust_proxy: admin_opts.trust_proxy,
        cors_origins,
    }))
}
