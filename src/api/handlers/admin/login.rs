//! Login page and credential submission.
//!
//! Flow Overview:
//! 1) `GET /login` binds an anonymous CSRF context cookie and returns its token.
//! 2) `POST /login` runs the rate limiter, the lockout tracker, the CSRF check and
//!    finally the credential verifier, in that order.
//! 3) Failures bump the lockout counter; success clears it and issues a session.

use axum::{
    extract::{ConnectInfo, Extension},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::Duration;
use std::{net::SocketAddr, sync::Arc};
use tracing::error;

use super::{
    csrf::{random_token, CsrfBinding, CSRF_COOKIE_NAME},
    error::AdminError,
    rate_limit::{RateLimitAction, RateLimitDecision},
    session::{read_cookie, SESSION_COOKIE_NAME},
    state::AdminState,
    types::{ErrorResponse, LoginForm, LoginPageResponse},
    utils::{audit, client_identifier, require_csrf, Outcome},
};

const LOGIN_CONTEXT_TTL_MINUTES: i64 = 60;
const MAX_CONTEXT_ID_LEN: usize = 128;

fn login_context(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, CSRF_COOKIE_NAME).filter(|id| {
        id.len() <= MAX_CONTEXT_ID_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "CSRF token for the login form", body = LoginPageResponse),
        (status = 303, description = "Already signed in, redirect to the panel")
    ),
    tag = "admin"
)]
pub async fn login_page(
    headers: HeaderMap,
    admin_state: Extension<Arc<AdminState>>,
) -> Response {
    let config = admin_state.config();
    if read_cookie(&headers, SESSION_COOKIE_NAME)
        .is_some_and(|token| admin_state.sessions().verify(&token).is_some())
    {
        return Redirect::to(&config.route("panel")).into_response();
    }

    let context = match login_context(&headers).map_or_else(random_token, Ok) {
        Ok(context) => context,
        Err(err) => {
            error!("Failed to create login context: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let csrf_token = match admin_state
        .csrf()
        .issue(&CsrfBinding::Anonymous(context.clone()))
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to issue login CSRF token: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    match config.cookie_policy().set(
        CSRF_COOKIE_NAME,
        &context,
        Duration::minutes(LOGIN_CONTEXT_TTL_MINUTES),
    ) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build login context cookie: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    (
        StatusCode::OK,
        response_headers,
        Json(LoginPageResponse { csrf_token }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in, session cookie set, redirect to the panel"),
        (status = 401, description = "Invalid username or password", body = ErrorResponse),
        (status = 403, description = "CSRF token missing or stale", body = ErrorResponse),
        (status = 429, description = "Too many failed attempts", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn login(
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    admin_state: Extension<Arc<AdminState>>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AdminError> {
    let state: &AdminState = &admin_state;
    let client = client_identifier(state, &headers, connect_info.as_ref());

    if let RateLimitDecision::Limited { retry_after } = state
        .rate_limiter()
        .check_ip(Some(&client), RateLimitAction::Login)
    {
        audit("login", Outcome::Rejected, None, &client, "rate limited");
        return Err(AdminError::RateLimited { retry_after });
    }

    if !state.lockout().check(&client) {
        audit("login", Outcome::Rejected, None, &client, "client is locked out");
        return Err(AdminError::LockedOut {
            retry_after: state.lockout().remaining_seconds(&client),
        });
    }

    let context = login_context(&headers);
    let binding = CsrfBinding::Anonymous(context.clone().unwrap_or_default());
    if context.is_none() || require_csrf(state, &binding, &headers, form.csrf.as_deref()).is_err() {
        audit("login", Outcome::Rejected, None, &client, "csrf token mismatch");
        return Err(AdminError::CsrfMismatch);
    }

    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        state.lockout().record_failure(&client);
        audit("login", Outcome::Rejected, None, &client, "missing username or password");
        return Err(AdminError::InvalidCredentials);
    }

    let verifier = state.credentials().clone();
    let (submitted, password) = (username.to_string(), form.password.clone());
    let verified = tokio::task::spawn_blocking(move || verifier.verify(&submitted, &password))
        .await
        .unwrap_or_else(|err| {
            error!("Credential verification task failed: {err}");
            false
        });
    if !verified {
        state.lockout().record_failure(&client);
        audit("login", Outcome::Rejected, Some(username), &client, "invalid credentials");
        return Err(AdminError::InvalidCredentials);
    }

    state.lockout().clear(&client);
    state
        .rate_limiter()
        .record_success(Some(&client), RateLimitAction::Login);
    state.csrf().discard(&binding);

    let (session, token) = state
        .sessions()
        .issue(username)
        .map_err(|err| AdminError::Storage(format!("failed to issue session: {err}")))?;

    let policy = state.config().cookie_policy();
    let mut response_headers = HeaderMap::new();
    let session_cookie = policy
        .set(SESSION_COOKIE_NAME, &token, state.sessions().validity())
        .map_err(|err| AdminError::Storage(format!("failed to build session cookie: {err}")))?;
    response_headers.append(SET_COOKIE, session_cookie);
    if let Ok(cleared) = policy.clear(CSRF_COOKIE_NAME) {
        response_headers.append(SET_COOKIE, cleared);
    }

    audit("login", Outcome::Success, Some(&session.principal), &client, "session issued");
    Ok((
        response_headers,
        Redirect::to(&state.config().route("panel")),
    )
        .into_response())
}
