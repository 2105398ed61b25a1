use axum::{
    http::{
        header::{LOCATION, RETRY_AFTER, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::types::ErrorResponse;
use crate::store::{AssetError, FieldError, StoreError};

/// Every way an admin request can fail.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("too many failed login attempts, try again in {retry_after} seconds")]
    LockedOut { retry_after: i64 },
    #[error("too many requests, try again in {retry_after} seconds")]
    RateLimited { retry_after: i64 },
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("session is missing or expired")]
    InvalidSession {
        login: String,
        clear_cookie: Option<HeaderValue>,
    },
    #[error("invalid or missing CSRF token")]
    CsrfMismatch,
    #[error("validation failed")]
    ValidationFailed(Vec<FieldError>),
    #[error("{reason}")]
    AssetRejected { reason: String, status: StatusCode },
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl AdminError {
    pub(super) fn field(field: &str, message: &str) -> Self {
        Self::ValidationFailed(vec![FieldError::new(field, message)])
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::LockedOut { .. } | Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::InvalidSession { .. } => StatusCode::SEE_OTHER,
            Self::CsrfMismatch => StatusCode::FORBIDDEN,
            Self::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AssetRejected { status, .. } => *status,
            Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AdminError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(fields) => Self::ValidationFailed(fields),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<AssetError> for AdminError {
    fn from(err: AssetError) -> Self {
        let status = match &err {
            AssetError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AssetError::UnsupportedType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AssetError::Empty => StatusCode::BAD_REQUEST,
            AssetError::Write { .. } => return Self::Storage(err.to_string()),
        };
        Self::AssetRejected {
            reason: err.to_string(),
            status,
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut headers = HeaderMap::new();

        let body = match self {
            Self::InvalidSession {
                login,
                clear_cookie,
            } => {
                if let Ok(location) = HeaderValue::from_str(&login) {
                    headers.insert(LOCATION, location);
                }
                if let Some(cookie) = clear_cookie {
                    headers.insert(SET_COOKIE, cookie);
                }
                return (status, headers).into_response();
            }
            Self::LockedOut { retry_after } | Self::RateLimited { retry_after } => {
                headers.insert(RETRY_AFTER, HeaderValue::from(retry_after.max(0)));
                ErrorResponse::new(&self)
            }
            Self::ValidationFailed(ref fields) => ErrorResponse {
                error: self.to_string(),
                fields: fields.clone(),
            },
            Self::Storage(ref detail) => {
                error!("admin storage failure: {detail}");
                ErrorResponse {
                    error: "the configuration could not be saved or loaded".to_string(),
                    fields: Vec::new(),
                }
            }
            _ => ErrorResponse::new(&self),
        };

        (status, headers, Json(body)).into_response()
    }
}
