//! Request/response types for admin endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::{ConfigPatch, Document, FieldError, IconKind};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub fields: Vec<FieldError>,
}

impl ErrorResponse {
    pub(super) fn new(err: &impl std::fmt::Display) -> Self {
        Self {
            error: err.to_string(),
            fields: Vec::new(),
        }
    }
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "_csrf")]
    pub csrf: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginPageResponse {
    pub csrf_token: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct PanelResponse {
    pub principal: String,
    pub csrf_token: String,
    pub config: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct ConfigUpdateRequest {
    #[serde(default)]
    pub csrf_token: Option<String>,
    #[serde(default)]
    pub verification_code: String,
    #[serde(flatten)]
    pub patch: ConfigPatch,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ConfigUpdateResponse {
    pub message: String,
    pub config: Document,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct FaviconResponse {
    pub message: String,
    pub favicon: String,
    pub kind: IconKind,
    pub size: usize,
}

/// Multipart body of the icon upload, for documentation.
#[derive(ToSchema, Deserialize, Debug)]
pub struct FaviconUpload {
    #[schema(value_type = String, format = Binary)]
    pub favicon: Vec<u8>,
    #[serde(default, rename = "_csrf")]
    pub csrf: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerificationCodeResponse {
    pub code: String,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct CsrfForm {
    #[serde(default, rename = "_csrf")]
    pub csrf: Option<String>,
}
