use axum::{
    extract::{ConnectInfo, Extension},
    http::HeaderMap,
    Json,
};
use std::{net::SocketAddr, sync::Arc};

use super::{
    csrf::CsrfBinding,
    error::AdminError,
    rate_limit::RateLimitAction,
    state::AdminState,
    types::{ConfigUpdateRequest, ConfigUpdateResponse, ErrorResponse},
    utils::{audit, client_identifier, require_csrf, require_rate, require_session, Outcome},
};

pub const VERIFICATION_CODE_FIELD: &str = "verificationCode";

/// Apply a field-level patch to the configuration document.
///
/// The request must carry the session's CSRF token (header or `csrf_token`)
/// and a current verification code. The patch is validated as a whole; any
/// failing field leaves the stored document untouched.
#[utoipa::path(
    post,
    path = "/config",
    request_body = ConfigUpdateRequest,
    responses(
        (status = 200, description = "Configuration saved", body = ConfigUpdateResponse),
        (status = 303, description = "No valid session, redirect to login"),
        (status = 403, description = "CSRF token missing or stale", body = ErrorResponse),
        (status = 422, description = "One or more fields are invalid", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Configuration could not be saved", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn update_config(
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    admin_state: Extension<Arc<AdminState>>,
    Json(request): Json<ConfigUpdateRequest>,
) -> Result<Json<ConfigUpdateResponse>, AdminError> {
    let state: &AdminState = &admin_state;
    let session = require_session(state, &headers)?;
    let client = client_identifier(state, &headers, connect_info.as_ref());
    let principal = Some(session.principal.as_str());
    require_rate(state, RateLimitAction::ConfigUpdate, &client, principal)?;

    let binding = CsrfBinding::Session(session.id.clone());
    if let Err(err) = require_csrf(state, &binding, &headers, request.csrf_token.as_deref()) {
        audit("config_update", Outcome::Rejected, principal, &client, "csrf token mismatch");
        return Err(err);
    }

    if !state
        .codes()
        .verify(&session.principal, &request.verification_code)
    {
        audit("config_update", Outcome::Rejected, principal, &client, "invalid verification code");
        return Err(AdminError::field(
            VERIFICATION_CODE_FIELD,
            "verification code is missing or expired",
        ));
    }

    match state.store().update(&request.patch).await {
        Ok(config) => {
            audit("config_update", Outcome::Success, principal, &client, "configuration saved");
            Ok(Json(ConfigUpdateResponse {
                message: "Configuration updated".to_string(),
                config,
            }))
        }
        Err(err) => {
            let err = AdminError::from(err);
            let outcome = match err {
                AdminError::ValidationFailed(_) => Outcome::Rejected,
                _ => Outcome::Failed,
            };
            audit("config_update", outcome, principal, &client, &err.to_string());
            Err(err)
        }
    }
}
