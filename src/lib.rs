//! # Gardi (Site Configuration Admin Panel)
//!
//! `gardi` is the administrative control plane for a single JSON site
//! configuration document and its site icon. One principal signs in, edits the
//! document field by field and replaces the icon; everything else is guarded.
//!
//! ## Request Guards
//!
//! - **Lockout:** five failed logins from one client within the window block
//!   further attempts, correct credentials included, until the window elapses.
//! - **Sessions:** HMAC signed, 24 hour tokens carried in an `HttpOnly`,
//!   `SameSite=Strict` cookie. Logout revokes the token server side.
//! - **CSRF:** every state changing request carries a token bound to its
//!   session (or, for login, to an anonymous context cookie).
//! - **Verification code:** configuration updates also need a short lived code
//!   derived from the session secret and the principal.
//!
//! ## Storage
//!
//! Updates are all-or-nothing read-modify-write cycles under a single writer
//! lock. The merged document is validated as a whole and replaced by
//! write-then-rename, so readers never observe a partial file.

pub mod api;
pub mod cli;
pub mod clock;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
