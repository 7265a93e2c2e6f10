//! Gateway-level error taxonomy.
//!
//! Every failure a single request can hit ends up as one of these variants and
//! is rendered as `{"message": "..."}` with the matching status code. Messages
//! for 5xx responses stay generic; the detailed cause only goes to the log.
use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Message returned for every missing / malformed `Authorization` header.
pub const MISSING_AUTH_HEADER_MESSAGE: &str = "Missing or invalid Authorization header";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    /// Routing target is not present in the services registry
    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Missing or invalid Authorization header")]
    MissingOrInvalidAuthHeader,

    /// The token authority was reached and refused the token
    #[error("Invalid token")]
    InvalidToken,

    /// Token fingerprint is present on the blacklist
    #[error("Token has been revoked")]
    RevokedToken,

    /// The token authority could not be reached
    #[error("Token verification unavailable: {0}")]
    VerificationUnavailable(String),

    /// Downstream service refused or dropped the connection
    #[error("Service connection error: {0}")]
    ServiceUnavailable(String),

    #[error("Downstream call exceeded {0:?}")]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// JSON body used for all error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownService(_) => StatusCode::NOT_FOUND,
            Self::MissingOrInvalidAuthHeader | Self::InvalidToken | Self::RevokedToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::VerificationUnavailable(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ServiceUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Client-facing message, free of internal detail.
    pub fn public_message(&self) -> String {
        match self {
            Self::UnknownService(name) => format!("Unknown service: {name}"),
            Self::MissingOrInvalidAuthHeader => MISSING_AUTH_HEADER_MESSAGE.to_string(),
            Self::InvalidToken => "Invalid token".to_string(),
            Self::RevokedToken => "Token has been revoked".to_string(),
            Self::VerificationUnavailable(_) => "Authentication failed".to_string(),
            Self::ServiceUnavailable(_) => "Service connection error".to_string(),
            Self::Timeout(_) => "Service timeout".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (
            status,
            Json(ErrorBody {
                message: self.public_message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::UnknownService("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::MissingOrInvalidAuthHeader.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::RevokedToken.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::VerificationUnavailable("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::ServiceUnavailable("refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::Timeout(Duration::from_secs(10)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[tokio::test]
    async fn test_server_errors_do_not_leak_detail() {
        let response =
            GatewayError::VerificationUnavailable("tcp connect 10.0.0.7:8000".into())
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Authentication failed");
    }

    #[tokio::test]
    async fn test_missing_header_body() {
        let response = GatewayError::MissingOrInvalidAuthHeader.into_response();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], MISSING_AUTH_HEADER_MESSAGE);
    }
}
