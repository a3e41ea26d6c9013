use crate::errors::AuthError;
use crate::handlers::auth_handler::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};
use common::jwt::{extract_bearer_token, TokenKind};
use std::sync::Arc;
use tracing::instrument;

/// Require a valid access token signed by this service.
///
/// The caller's `AuthenticatedIdentity` is stored in request extensions for
/// downstream handlers. Refresh tokens are rejected.
#[instrument(skip_all, name = "auth.middleware.require_access_token")]
pub async fn require_access_token(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "auth.middleware", "Missing Authorization header");
            AuthError::InvalidToken("Missing Authorization header".to_string())
        })?;

    let token = extract_bearer_token(auth_header).ok_or_else(|| {
        tracing::debug!(target: "auth.middleware", "Invalid Authorization header format");
        AuthError::InvalidToken("Invalid Authorization header format".to_string())
    })?;

    let claims = state.token_service.verify(token, TokenKind::Access)?;

    req.extensions_mut().insert(claims.identity());

    Ok(next.run(req).await)
}
