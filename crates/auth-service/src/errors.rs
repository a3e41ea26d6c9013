//! Auth service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Client
//! messages are generic; the underlying cause is logged server-side.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::jwt::TokenError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Unknown user or wrong password. The two are deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// A structurally valid token of the wrong kind, e.g. an access token
    /// presented to the refresh endpoint.
    #[error("Invalid token type")]
    InvalidTokenType,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The change would violate a uniqueness rule, e.g. a taken email.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal,
}

impl AuthError {
    /// HTTP status code for this error (also used as a metrics label).
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Database(_) | AuthError::Crypto(_) | AuthError::Internal => 500,
            AuthError::InvalidCredentials
            | AuthError::InvalidToken(_)
            | AuthError::InvalidTokenType => 401,
            AuthError::BadRequest(_) => 400,
            AuthError::Conflict(_) => 409,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::WrongTokenType => AuthError::InvalidTokenType,
            TokenError::Signing(reason) => AuthError::Crypto(reason),
            other => AuthError::InvalidToken(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::Database(err) => {
                tracing::error!(target: "auth.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            AuthError::Crypto(err) => {
                tracing::error!(target: "auth.crypto", error = %err, "Cryptographic operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CRYPTO_ERROR",
                    "An internal cryptographic error occurred".to_string(),
                )
            }
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            AuthError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            AuthError::InvalidTokenType => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN_TYPE",
                "Invalid token type".to_string(),
            ),
            AuthError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            AuthError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            AuthError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
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
