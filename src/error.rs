// src/error.rs
//! HTTP-facing error type.
//!
//! Service errors are converted into `ApiError` at the handler boundary and
//! rendered as `{"error": "..."}` with a matching status code. Authentication
//! failures never carry detail.

use crate::services::authenticator::LoginError;
use crate::services::badge_issuer::IssueError;
use crate::services::registry::RegistryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    /// A required secret is absent from the deployment
    #[error("Server not configured (missing {0})")]
    Configuration(&'static str),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Registry was modified concurrently; retry the request")]
    Conflict,

    #[error("Registry store unavailable")]
    Store,

    #[error("Internal error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Configuration(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Store => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::NotConfigured(name) => ApiError::Configuration(name),
            LoginError::Unauthorized => ApiError::Unauthorized,
            LoginError::Token(e) => {
                log::error!("Failed to sign session token: {}", e);
                ApiError::Internal
            }
        }
    }
}

impl From<IssueError> for ApiError {
    fn from(err: IssueError) -> Self {
        log::error!("Badge issuance failed: {}", err);
        match err {
            IssueError::Registry(RegistryError::Conflict { .. }) => ApiError::Conflict,
            IssueError::Registry(RegistryError::Store(_)) => ApiError::Store,
            IssueError::Registry(RegistryError::Encode(_)) | IssueError::Random(_) => ApiError::Internal,
        }
    }
}
