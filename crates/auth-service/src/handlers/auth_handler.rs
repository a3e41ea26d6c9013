use crate::errors::AuthError;
use crate::handlers::extract::AppJson;
use crate::models::{LogoutResponse, UserProfileResponse};
use crate::repositories::users::{ProfileUpdate, User};
use crate::services::token_service::{TokenPair, TokenService};
use axum::{extract::State, Extension, Json};
use common::jwt::AuthenticatedIdentity;
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Minimum accepted password length at the login boundary.
const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: SecretString,
}

/// Only the caller's own name and email can change; any other field
/// (`is_admin` included) is rejected.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub token_service: Arc<TokenService>,
}

/// Handle login
///
/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let email = payload.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::BadRequest("A valid email is required".to_string()));
    }
    if payload.password.expose_secret().len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let pair = state
        .token_service
        .login(email, payload.password.expose_secret())
        .await?;

    Ok(Json(pair))
}

/// Handle token refresh
///
/// POST /api/v1/auth/refresh
pub async fn handle_refresh(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    if payload.refresh_token.expose_secret().is_empty() {
        return Err(AuthError::BadRequest("refresh_token is required".to_string()));
    }

    let pair = state
        .token_service
        .refresh(payload.refresh_token.expose_secret())
        .await?;

    Ok(Json(pair))
}

/// Handle logout
///
/// POST /api/v1/auth/logout (access token required)
pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    AppJson(payload): AppJson<LogoutRequest>,
) -> Result<Json<LogoutResponse>, AuthError> {
    let outcome = state
        .token_service
        .logout(&identity, payload.refresh_token.expose_secret())
        .await?;

    let message = if outcome.revoked {
        "Logged out successfully"
    } else {
        "Logged out successfully. Tokens remain valid until they expire"
    };

    Ok(Json(LogoutResponse {
        message: message.to_string(),
        revoked: outcome.revoked,
    }))
}

/// Handle profile lookup for the caller
///
/// GET /api/v1/auth/me, GET /api/v1/users/profile (access token required)
pub async fn handle_me(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> Result<Json<UserProfileResponse>, AuthError> {
    let user_id = caller_id(&identity)?;

    let user = state
        .token_service
        .users()
        .find_by_id(user_id)
        .await?
        .ok_or_else(user_gone)?;

    Ok(Json(profile_response(user)))
}

/// Handle a profile change for the caller
///
/// PUT /api/v1/users/profile (access token required)
///
/// Tokens already issued keep the old email until they expire.
pub async fn handle_update_profile(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<UserProfileResponse>, AuthError> {
    let user_id = caller_id(&identity)?;

    let update = ProfileUpdate {
        name: payload.name.map(|n| n.trim().to_string()),
        email: payload.email.map(|e| e.trim().to_string()),
    };
    if update.name.is_none() && update.email.is_none() {
        return Err(AuthError::BadRequest(
            "At least one of name or email is required".to_string(),
        ));
    }
    if update.name.as_deref().is_some_and(str::is_empty) {
        return Err(AuthError::BadRequest("Name must not be empty".to_string()));
    }
    if update
        .email
        .as_deref()
        .is_some_and(|e| e.is_empty() || !e.contains('@'))
    {
        return Err(AuthError::BadRequest("A valid email is required".to_string()));
    }

    let user = state
        .token_service
        .users()
        .update_profile(user_id, &update)
        .await?
        .ok_or_else(user_gone)?;

    tracing::info!(target: "auth.handler", user_id = %user.user_id, "Profile updated");

    Ok(Json(profile_response(user)))
}

fn caller_id(identity: &AuthenticatedIdentity) -> Result<Uuid, AuthError> {
    Uuid::parse_str(&identity.subject_id).map_err(|_| {
        tracing::debug!(target: "auth.handler", "Access token subject is not a user id");
        AuthError::InvalidToken("The access token is invalid or expired".to_string())
    })
}

/// The token is valid but its user was deleted.
fn user_gone() -> AuthError {
    AuthError::InvalidToken("The access token is invalid or expired".to_string())
}

fn profile_response(user: User) -> UserProfileResponse {
    UserProfileResponse {
        id: user.user_id.to_string(),
        email: user.email,
        name: user.name,
        is_admin: user.is_admin,
    }
}
