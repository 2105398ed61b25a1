//! Small helpers shared by the admin handlers: client identity, session and
//! CSRF guards, and audit events.

use axum::{extract::ConnectInfo, http::HeaderMap};
use std::net::SocketAddr;
use tracing::{error, info, warn};

use super::{
    csrf::{CsrfBinding, CSRF_HEADER_NAME},
    error::AdminError,
    rate_limit::{RateLimitAction, RateLimitDecision},
    session::{read_cookie, Session, SESSION_COOKIE_NAME},
    state::AdminState,
};

const UNKNOWN_CLIENT: &str = "unknown";

/// Extract a client IP from common proxy headers.
pub(super) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Identifier used for lockout bookkeeping. Proxy headers are only honored when
/// the deployment says a trusted proxy sets them.
pub(super) fn client_identifier(
    state: &AdminState,
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> String {
    if state.config().trust_proxy() {
        if let Some(ip) = extract_client_ip(headers) {
            return ip;
        }
    }
    connect_info.map_or_else(
        || UNKNOWN_CLIENT.to_string(),
        |ConnectInfo(addr)| addr.ip().to_string(),
    )
}

/// Resolve the session cookie. Anything but a valid session redirects to login.
pub(super) fn require_session(state: &AdminState, headers: &HeaderMap) -> Result<Session, AdminError> {
    let token = read_cookie(headers, SESSION_COOKIE_NAME);
    if let Some(session) = token.as_deref().and_then(|t| state.sessions().verify(t)) {
        return Ok(session);
    }
    let clear_cookie = token.and_then(|_| {
        state
            .config()
            .cookie_policy()
            .clear(SESSION_COOKIE_NAME)
            .ok()
    });
    Err(AdminError::InvalidSession {
        login: state.config().route("login"),
        clear_cookie,
    })
}

/// Spend one attempt of `action` for `client`, auditing the rejection.
pub(super) fn require_rate(
    state: &AdminState,
    action: RateLimitAction,
    client: &str,
    principal: Option<&str>,
) -> Result<(), AdminError> {
    match state.rate_limiter().check_ip(Some(client), action) {
        RateLimitDecision::Allowed => Ok(()),
        RateLimitDecision::Limited { retry_after } => {
            audit(action.as_str(), Outcome::Rejected, principal, client, "rate limited");
            Err(AdminError::RateLimited { retry_after })
        }
    }
}

/// Check the CSRF token from the header, falling back to the body field.
pub(super) fn require_csrf(
    state: &AdminState,
    binding: &CsrfBinding,
    headers: &HeaderMap,
    body_token: Option<&str>,
) -> Result<(), AdminError> {
    let presented = headers
        .get(CSRF_HEADER_NAME)
        .and_then(|value| value.to_str().ok())
        .or(body_token)
        .map(str::trim)
        .unwrap_or_default();
    if state.csrf().validate(binding, presented) {
        Ok(())
    } else {
        Err(AdminError::CsrfMismatch)
    }
}

#[derive(Clone, Copy, Debug)]
pub(super) enum Outcome {
    Success,
    Rejected,
    Failed,
}

/// Emit a structured audit event. Never pass secrets here.
pub(super) fn audit(operation: &str, outcome: Outcome, principal: Option<&str>, client: &str, detail: &str) {
    let principal = principal.unwrap_or("-");
    match outcome {
        Outcome::Success => {
            info!(target: "audit", operation, principal, client, outcome = "success", "{detail}");
        }
        Outcome::Rejected => {
            warn!(target: "audit", operation, principal, client, outcome = "rejected", "{detail}");
        }
        Outcome::Failed => {
            error!(target: "audit", operation, principal, client, outcome = "failed", "{detail}");
        }
    }
}
