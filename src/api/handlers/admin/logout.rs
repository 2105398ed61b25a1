use axum::{
    extract::{ConnectInfo, Extension},
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use std::{net::SocketAddr, sync::Arc};

use super::{
    csrf::CsrfBinding,
    error::AdminError,
    session::SESSION_COOKIE_NAME,
    state::AdminState,
    types::{CsrfForm, ErrorResponse},
    utils::{audit, client_identifier, require_csrf, require_session, Outcome},
};

/// Destroy the current session server-side and clear its cookie.
#[utoipa::path(
    post,
    path = "/logout",
    request_body(content = CsrfForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Session destroyed, redirect to login"),
        (status = 403, description = "CSRF token missing or stale", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn logout(
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    admin_state: Extension<Arc<AdminState>>,
    form: Option<Form<CsrfForm>>,
) -> Result<Response, AdminError> {
    let state: &AdminState = &admin_state;
    let session = require_session(state, &headers)?;
    let client = client_identifier(state, &headers, connect_info.as_ref());

    let binding = CsrfBinding::Session(session.id.clone());
    let body_token = form.as_ref().and_then(|Form(form)| form.csrf.as_deref());
    if let Err(err) = require_csrf(state, &binding, &headers, body_token) {
        audit("logout", Outcome::Rejected, Some(&session.principal), &client, "csrf token mismatch");
        return Err(err);
    }

    state.sessions().revoke(&session);
    state.csrf().discard(&binding);

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = state.config().cookie_policy().clear(SESSION_COOKIE_NAME) {
        response_headers.insert(SET_COOKIE, cookie);
    }

    audit("logout", Outcome::Success, Some(&session.principal), &client, "session destroyed");
    Ok((
        response_headers,
        Redirect::to(&state.config().route("login")),
    )
        .into_response())
}
