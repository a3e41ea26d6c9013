use crate::handlers::auth_handler::AppState;
use crate::models::HealthResponse;
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

/// Health check including a round-trip to the user store.
///
/// GET /health
///
/// 200 with `database: "connected"`, or 503 with `status: "unhealthy"` and
/// `database: "disconnected"` when the store does not answer.
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (status_code, status, database) = match state.token_service.users().health_check().await {
        Ok(()) => (StatusCode::OK, "healthy", "connected"),
        Err(e) => {
            tracing::warn!(target: "auth.health", error = %e, "Database health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
        }
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            service: "auth-service".to_string(),
            database: database.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
