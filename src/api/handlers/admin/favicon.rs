//! Site icon upload.
//!
//! The multipart body is read completely before anything is validated, so the
//! CSRF token may appear before or after the file field.
//!
//! The icon is staged, the document is updated, and only then is the icon
//! renamed into place. A rejected document update leaves the public icon as it was.

use axum::{
    extract::{multipart::MultipartError, ConnectInfo, Extension, Multipart},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::{net::SocketAddr, sync::Arc};

use super::{
    csrf::{CsrfBinding, CSRF_FORM_FIELD},
    error::AdminError,
    rate_limit::RateLimitAction,
    state::AdminState,
    types::{ErrorResponse, FaviconResponse, FaviconUpload},
    utils::{audit, client_identifier, require_csrf, require_rate, require_session, Outcome},
};
use crate::store::{AssetError, ConfigPatch};

pub const FAVICON_FIELD: &str = "favicon";
/// Room for multipart boundaries and the CSRF field on top of the icon itself.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Default)]
struct Upload {
    csrf: Option<String>,
    file_name: String,
    content_type: String,
    bytes: Option<Vec<u8>>,
}

fn multipart_error(err: &MultipartError, limit: usize) -> AdminError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AdminError::AssetRejected {
            reason: format!("upload exceeds the {limit} byte limit"),
            status: StatusCode::PAYLOAD_TOO_LARGE,
        }
    } else {
        AdminError::Malformed(err.body_text())
    }
}

async fn read_upload(multipart: &mut Multipart, limit: usize) -> Result<Upload, AdminError> {
    let mut upload = Upload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(&err, limit))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(CSRF_FORM_FIELD) => {
                upload.csrf = Some(
                    field
                        .text()
                        .await
                        .map_err(|err| multipart_error(&err, limit))?,
                );
            }
            Some(FAVICON_FIELD) => {
                upload.file_name = field.file_name().unwrap_or_default().to_string();
                upload.content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| multipart_error(&err, limit))?;
                upload.bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }
    Ok(upload)
}

#[utoipa::path(
    post,
    path = "/favicon",
    request_body(content = FaviconUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Icon stored and recorded in the configuration", body = FaviconResponse),
        (status = 303, description = "No valid session, redirect to login"),
        (status = 403, description = "CSRF token missing or stale", body = ErrorResponse),
        (status = 413, description = "Icon exceeds the size limit", body = ErrorResponse),
        (status = 415, description = "Only .ico and .png icons are accepted", body = ErrorResponse),
        (status = 422, description = "Configuration document failed validation", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn upload_favicon(
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    admin_state: Extension<Arc<AdminState>>,
    mut multipart: Multipart,
) -> Result<Json<FaviconResponse>, AdminError> {
    let state: &AdminState = &admin_state;
    let session = require_session(state, &headers)?;
    let client = client_identifier(state, &headers, connect_info.as_ref());
    let principal = Some(session.principal.as_str());
    require_rate(state, RateLimitAction::AssetUpload, &client, principal)?;

    let upload = match read_upload(&mut multipart, state.assets().max_bytes()).await {
        Ok(upload) => upload,
        Err(err) => {
            audit("favicon_upload", Outcome::Rejected, principal, &client, &err.to_string());
            return Err(err);
        }
    };

    let binding = CsrfBinding::Session(session.id.clone());
    if let Err(err) = require_csrf(state, &binding, &headers, upload.csrf.as_deref()) {
        audit("favicon_upload", Outcome::Rejected, principal, &client, "csrf token mismatch");
        return Err(err);
    }

    let Some(bytes) = upload.bytes else {
        audit("favicon_upload", Outcome::Rejected, principal, &client, "no favicon field");
        return Err(AssetError::Empty.into());
    };
    let staged = match state
        .assets()
        .stage(&bytes, &upload.file_name, &upload.content_type)
        .await
    {
        Ok(staged) => staged,
        Err(err) => {
            let outcome = if err.is_rejection() {
                Outcome::Rejected
            } else {
                Outcome::Failed
            };
            audit("favicon_upload", outcome, principal, &client, &err.to_string());
            return Err(err.into());
        }
    };

    // Re-uploading the same kind changes no field but still counts as a modification.
    let patch = ConfigPatch::favicon(staged.asset().relative_path.clone());
    if let Err(err) = state.store().touch(&patch).await {
        staged.discard().await;
        audit("favicon_upload", Outcome::Failed, principal, &client, &err.to_string());
        return Err(err.into());
    }

    let stored = match staged.commit().await {
        Ok(stored) => stored,
        Err(err) => {
            audit("favicon_upload", Outcome::Failed, principal, &client, &err.to_string());
            return Err(err.into());
        }
    };

    audit("favicon_upload", Outcome::Success, principal, &client, &stored.relative_path);
    Ok(Json(FaviconResponse {
        message: "Favicon updated".to_string(),
        favicon: stored.relative_path,
        kind: stored.kind,
        size: stored.size,
    }))
}
