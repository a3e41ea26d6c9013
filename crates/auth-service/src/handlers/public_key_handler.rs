//! Public key distribution.
//!
//! Gateways fetch the issuer's verification key here and cache it. The
//! response is the same for the lifetime of the process.

use crate::handlers::auth_handler::AppState;
use crate::models::PublicKeyResponse;
use crate::observability::metrics::record_public_key_request;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use common::jwt::SIGNING_ALGORITHM_NAME;
use std::sync::Arc;

/// GET /api/v1/auth/public-key
pub async fn handle_public_key(State(state): State<Arc<AppState>>) -> Response {
    record_public_key_request();

    let body = PublicKeyResponse {
        public_key: state.token_service.keys().public_key_pem().to_string(),
        algorithm: SIGNING_ALGORITHM_NAME.to_string(),
        key_type: "RSA".to_string(),
    };

    // Gateways cache for an hour on their side; keep intermediaries in step.
    ([(header::CACHE_CONTROL, "public, max-age=3600")], Json(body)).into_response()
}
