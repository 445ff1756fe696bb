//! HTTP-facing error type for the connector's admin surface:
//! `IntoResponse` over a small closed set of cases rather than a bare
//! status code at every call site.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::errors::FabricError;

const LOG_TARGET: &str = "connector::error";

#[derive(Debug)]
pub enum GatewayError {
    BadRequest(String),
    Unauthorized(String),
    Internal(String),
}

impl GatewayError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<FabricError> for GatewayError {
    fn from(err: FabricError) -> Self {
        match err {
            FabricError::ClientProtocol(msg) => GatewayError::BadRequest(msg),
            FabricError::AuthFailure(msg) => GatewayError::Unauthorized(msg),
            FabricError::Admission(msg) => GatewayError::BadRequest(msg),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            GatewayError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message).into_response(),
            GatewayError::Internal(message) => {
                error!(target: LOG_TARGET, %message, "internal gateway error");
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}
