//! HTTP mapping of lease errors.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use pkg_lifecycle::LifecycleError;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,

    #[error("{message}")]
    RateLimited {
        retry_after: Duration,
        message: String,
    },

    /// The request body could not be decoded.
    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl ApiError {
    /// - Validation / bad body: 400
    /// - Unauthorized: 401
    /// - NotFound: 404
    /// - Conflict: 409
    /// - RateLimited: 429
    /// - Internal: 500
    /// - Provider: 502
    /// - ServiceUnavailable: 503
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Lifecycle(e) => match e {
                LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
                LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
                LifecycleError::Conflict(_) => StatusCode::CONFLICT,
                LifecycleError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                LifecycleError::Provider(_) => StatusCode::BAD_GATEWAY,
                LifecycleError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Lifecycle(LifecycleError::Internal(e)) => {
                error!("Internal error serving request: {:#}", e);
                "internal server error".to_string()
            }
            Self::Lifecycle(LifecycleError::Provider(e)) => {
                format!("provisioning service error: {}", e)
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let Self::RateLimited { retry_after, .. } = &self {
            let secs = retry_after.as_millis().div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
