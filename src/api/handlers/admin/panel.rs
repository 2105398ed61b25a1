use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use std::sync::Arc;

use super::{
    csrf::CsrfBinding,
    error::AdminError,
    state::AdminState,
    types::PanelResponse,
    utils::{audit, require_session, Outcome},
};

const PUBLIC_SITE_ROOT: &str = "/";

#[utoipa::path(
    get,
    path = "/",
    responses((status = 303, description = "Redirect to the login page")),
    tag = "admin"
)]
pub async fn index(admin_state: Extension<Arc<AdminState>>) -> Redirect {
    Redirect::to(&admin_state.config().route("login"))
}

/// Current document plus a fresh CSRF token for the panel's forms.
///
/// A document that cannot be read still renders the panel, with `config: null`
/// and a 500 status, so the operator sees the failure instead of a login loop.
#[utoipa::path(
    get,
    path = "/panel",
    responses(
        (status = 200, description = "Current configuration", body = PanelResponse),
        (status = 303, description = "No valid session, redirect to login"),
        (status = 500, description = "Configuration could not be loaded", body = PanelResponse)
    ),
    tag = "admin"
)]
pub async fn panel(
    headers: HeaderMap,
    admin_state: Extension<Arc<AdminState>>,
) -> Result<Response, AdminError> {
    let state: &AdminState = &admin_state;
    let session = require_session(state, &headers)?;
    let csrf_token = state
        .csrf()
        .issue(&CsrfBinding::Session(session.id.clone()))
        .map_err(|err| AdminError::Storage(format!("failed to issue CSRF token: {err}")))?;

    let (status, config, error) = match state.store().load().await {
        Ok(document) => (StatusCode::OK, Some(document), None),
        Err(err) => {
            audit(
                "panel",
                Outcome::Failed,
                Some(&session.principal),
                "-",
                &err.to_string(),
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                None,
                Some("the configuration could not be loaded".to_string()),
            )
        }
    };

    Ok((
        status,
        Json(PanelResponse {
            principal: session.principal,
            csrf_token,
            config,
            error,
        }),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/preview",
    responses(
        (status = 303, description = "Redirect to the public site, or to login without a session")
    ),
    tag = "admin"
)]
pub async fn preview(
    headers: HeaderMap,
    admin_state: Extension<Arc<AdminState>>,
) -> Result<Redirect, AdminError> {
    require_session(&admin_state, &headers)?;
    Ok(Redirect::to(PUBLIC_SITE_ROOT))
}
