//! Gateway error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Token
//! failures share one client-facing message; the specific reason is logged.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::jwt::TokenError;
use serde::Serialize;
use thiserror::Error;

/// Gateway error type.
///
/// Maps to HTTP status codes:
/// - InvalidPath: 400 Bad Request
/// - MissingCredentials, MalformedHeader, InvalidToken: 401 Unauthorized
/// - KeyUnavailable: 503 Service Unavailable
/// - UnknownBackend: 404 Not Found
/// - RequestTooLarge: 413 Payload Too Large
/// - BackendUnavailable: 502 Bad Gateway
/// - InternalProxyError: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Dot segments, backslashes or encoded separators in the path.
    #[error("Request path is not canonical")]
    InvalidPath,

    #[error("Authorization header required")]
    MissingCredentials,

    #[error("Invalid authorization header format. Expected 'Bearer <token>'")]
    MalformedHeader,

    /// Covers every verification failure, including a refresh token
    /// presented where an access token is required.
    #[error(transparent)]
    InvalidToken(#[from] TokenError),

    /// The issuer's public key could not be obtained.
    #[error("Public key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Unknown service: {0}")]
    UnknownBackend(String),

    #[error("Request body exceeds the configured limit")]
    RequestTooLarge,

    /// Upstream unreachable after all retries. Holds the backend name.
    #[error("Service {0} is unavailable")]
    BackendUnavailable(String),

    #[error("Failed to create proxy request: {0}")]
    InternalProxyError(String),
}

impl GatewayError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::InvalidPath => 400,
            GatewayError::MissingCredentials
            | GatewayError::MalformedHeader
            | GatewayError::InvalidToken(_) => 401,
            GatewayError::KeyUnavailable(_) => 503,
            GatewayError::UnknownBackend(_) => 404,
            GatewayError::RequestTooLarge => 413,
            GatewayError::BackendUnavailable(_) => 502,
            GatewayError::InternalProxyError(_) => 500,
        }
    }

    /// Low-cardinality label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::InvalidPath => "invalid_path",
            GatewayError::MissingCredentials => "missing_credentials",
            GatewayError::MalformedHeader => "malformed_header",
            GatewayError::InvalidToken(e) => e.reason(),
            GatewayError::KeyUnavailable(_) => "key_unavailable",
            GatewayError::UnknownBackend(_) => "unknown_backend",
            GatewayError::RequestTooLarge => "request_too_large",
            GatewayError::BackendUnavailable(_) => "backend_unavailable",
            GatewayError::InternalProxyError(_) => "internal_proxy_error",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GatewayError::InvalidPath => {
                (StatusCode::BAD_REQUEST, "INVALID_PATH", self.to_string())
            }
            GatewayError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "MISSING_CREDENTIALS",
                self.to_string(),
            ),
            GatewayError::MalformedHeader => (
                StatusCode::UNAUTHORIZED,
                "INVALID_AUTHORIZATION_HEADER",
                self.to_string(),
            ),
            GatewayError::InvalidToken(err) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", err.to_string())
            }
            GatewayError::KeyUnavailable(reason) => {
                tracing::warn!(target: "gateway.availability", reason = %reason, "Public key unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "AUTH_UNAVAILABLE",
                    "Authentication temporarily unavailable".to_string(),
                )
            }
            GatewayError::UnknownBackend(name) => (
                StatusCode::NOT_FOUND,
                "UNKNOWN_SERVICE",
                format!("Unknown service: {}", name),
            ),
            GatewayError::RequestTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                self.to_string(),
            ),
            GatewayError::BackendUnavailable(_) => {
                (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", self.to_string())
            }
            GatewayError::InternalProxyError(err) => {
                tracing::error!(target: "gateway.proxy", error = %err, "Proxy request construction failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Failed to create proxy request".to_string(),
                )
            }
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                error: message,
                code,
            }),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"home-server\""),
            );
        }

        response
    }
}
