//! Error kinds returned by auth operations and their HTTP mapping.
//!
//! Every variant maps to a stable status and `{"error": "<code>"}` body. Store
//! failures are logged server-side and never serialized.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password, or a wrong, expired, consumed or missing code.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid email")]
    InvalidEmail,
    #[error("failed to deliver message")]
    SendFailed,
    #[error("not an admin account")]
    NotAdmin,
    #[error("forbidden")]
    Forbidden,
    #[error("backing store unavailable: {0:#}")]
    Unavailable(#[source] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidEmail => "invalid_email",
            Self::SendFailed => "send_failed",
            Self::NotAdmin => "not_admin",
            Self::Forbidden => "forbidden",
            Self::Unavailable(_) => "unavailable",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::InvalidEmail => StatusCode::BAD_REQUEST,
            Self::SendFailed => StatusCode::BAD_GATEWAY,
            Self::NotAdmin | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Body returned for every error response.
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    #[must_use]
    pub fn new(code: &str) -> Self {
        Self {
            error: code.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Unavailable(err) = &self {
            error!("auth store unavailable: {err:#}");
        }
        (self.status(), Json(ErrorBody::new(self.code()))).into_response()
    }
}
