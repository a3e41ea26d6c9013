//! Authentication middleware for proxied routes.
//!
//! One middleware function serves both policies. The policy is chosen per
//! request from the configured public path prefixes:
//! - `Required` - failures end the request with the error response
//! - `Optional` - failures continue anonymously
//!
//! Paths with dot segments are refused before the policy is chosen, so the
//! path the policy sees is the path the backend receives.
//!
//! Client-supplied identity headers are always stripped. When a token
//! validates, the identity is injected as `X-User-*` headers for the backend
//! and as an [`AuthenticatedIdentity`] request extension.

use crate::auth::RequestAuthenticator;
use crate::errors::GatewayError;
use crate::services::path::ensure_canonical_path;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use common::jwt::AuthenticatedIdentity;
use std::sync::Arc;
use tracing::instrument;

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
pub const USER_EMAIL_HEADER: HeaderName = HeaderName::from_static("x-user-email");
pub const USER_IS_ADMIN_HEADER: HeaderName = HeaderName::from_static("x-user-is-admin");

/// Whether a route demands a valid access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    Required,
    Optional,
}

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<RequestAuthenticator>,
    public_paths: Arc<[String]>,
}

impl AuthState {
    pub fn new(authenticator: Arc<RequestAuthenticator>, public_paths: Vec<String>) -> Self {
        Self {
            authenticator,
            public_paths: public_paths.into(),
        }
    }

    /// `Optional` if `path` equals a public prefix or lies beneath it.
    pub fn policy_for(&self, path: &str) -> AuthPolicy {
        let is_public = self.public_paths.iter().any(|prefix| {
            prefix == "/"
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        });

        if is_public {
            AuthPolicy::Optional
        } else {
            AuthPolicy::Required
        }
    }
}

/// Authenticate the request under the policy for its path.
///
/// # Response
///
/// - Non-canonical path: 400 under either policy
/// - Required: 401 (or 503 if the issuer key is unavailable) on failure
/// - Optional: always continues; identity headers only when authenticated
#[instrument(skip_all, name = "gateway.middleware.auth")]
pub async fn authenticate_request(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    ensure_canonical_path(req.uri().path())?;
    let policy = state.policy_for(req.uri().path());

    strip_identity_headers(req.headers_mut());

    // Non-UTF-8 header values are treated as an unparsable scheme
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default().to_string());

    if policy == AuthPolicy::Optional && authorization.is_none() {
        return Ok(next.run(req).await);
    }

    match state.authenticator.authenticate(authorization.as_deref()).await {
        Ok(identity) => {
            inject_identity_headers(req.headers_mut(), &identity);
            req.extensions_mut().insert(identity);
        }
        Err(e) if policy == AuthPolicy::Required => return Err(e),
        Err(e) => {
            tracing::debug!(
                target: "gateway.middleware.auth",
                reason = e.reason(),
                "Optional authentication failed, continuing anonymously"
            );
        }
    }

    Ok(next.run(req).await)
}

fn strip_identity_headers(headers: &mut HeaderMap) {
    headers.remove(USER_ID_HEADER);
    headers.remove(USER_EMAIL_HEADER);
    headers.remove(USER_IS_ADMIN_HEADER);
}

fn inject_identity_headers(headers: &mut HeaderMap, identity: &AuthenticatedIdentity) {
    match HeaderValue::from_str(&identity.subject_id) {
        Ok(value) => {
            headers.insert(USER_ID_HEADER, value);
        }
        Err(_) => {
            tracing::warn!(target: "gateway.middleware.auth", "Subject id is not a valid header value");
        }
    }
    match HeaderValue::from_str(&identity.email) {
        Ok(value) => {
            headers.insert(USER_EMAIL_HEADER, value);
        }
        Err(_) => {
            tracing::warn!(target: "gateway.middleware.auth", "Email is not a valid header value");
        }
    }
    headers.insert(
        USER_IS_ADMIN_HEADER,
        HeaderValue::from_static(if identity.is_admin { "true" } else { "false" }),
    );
}
