//! Administrative surface guarding the site configuration document.
//!
//! Every admin request passes the same gates in order: the lockout tracker
//! (login only), the credential verifier (login) or the session authority
//! (everything else), the CSRF guard for state-changing routes, and finally the
//! config store or asset replacer. Outcomes are emitted as `audit` events.
//!
//! ## Sessions
//!
//! Sessions are HMAC-signed tokens in an `HttpOnly`, `SameSite=Strict` cookie
//! scoped to the admin path. They expire 24 hours after issuance; logout
//! revokes the session id server-side.
//!
//! ## Lockout
//!
//! - **Threshold:** 5 failed logins per client.
//! - **Window:** 15 minutes since the last failure (configurable).
//!
//! State is process-local; a restart forgets both lockouts and revocations.

pub mod config_update;
pub mod credentials;
pub mod csrf;
mod error;
pub mod favicon;
pub mod lockout;
pub mod login;
pub mod logout;
pub mod panel;
mod rate_limit;
pub mod session;
mod state;
pub mod types;
mod utils;
pub mod verification;

pub use credentials::hash_password;
pub use error::AdminError;
pub use lockout::MAX_LOCKOUT_SECONDS;
pub use rate_limit::{
    IpRateLimiter, NoopRateLimiter, RateLimit, RateLimitAction, RateLimitDecision, RateLimiter,
};
pub use state::{AdminConfig, AdminState};
