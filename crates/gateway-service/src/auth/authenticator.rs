//! Request authenticator.
//!
//! Turns a raw `Authorization` header into an [`AuthenticatedIdentity`] by
//! validating the bearer token locally against the cached issuer key. Only
//! access tokens authorize API calls.

use crate::auth::key_cache::PublicKeyCache;
use crate::errors::GatewayError;
use crate::observability::metrics;
use common::jwt::{self, AuthenticatedIdentity, TokenKind};
use std::sync::Arc;
use tracing::instrument;

pub struct RequestAuthenticator {
    key_cache: Arc<PublicKeyCache>,
}

impl RequestAuthenticator {
    pub fn new(key_cache: Arc<PublicKeyCache>) -> Self {
        Self { key_cache }
    }

    pub fn key_cache(&self) -> &PublicKeyCache {
        &self.key_cache
    }

    /// Authenticate a request from its `Authorization` header value.
    ///
    /// # Errors
    ///
    /// - `MissingCredentials` if the header is absent
    /// - `MalformedHeader` if it is not `Bearer <token>`
    /// - `KeyUnavailable` if the issuer key cannot be obtained
    /// - `InvalidToken` for any verification failure, including a refresh token
    #[instrument(skip_all, name = "gateway.auth.authenticate")]
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<AuthenticatedIdentity, GatewayError> {
        let result = self.validate(authorization).await;

        match &result {
            Ok(identity) => {
                metrics::record_token_validation("success", "none");
                tracing::debug!(
                    target: "gateway.auth",
                    user_id = %identity.subject_id,
                    is_admin = identity.is_admin,
                    "Token validated"
                );
            }
            Err(e) => {
                metrics::record_token_validation("error", e.reason());
                tracing::debug!(target: "gateway.auth", reason = e.reason(), "Token validation failed");
            }
        }

        result
    }

    async fn validate(
        &self,
        authorization: Option<&str>,
    ) -> Result<AuthenticatedIdentity, GatewayError> {
        let header = authorization.ok_or(GatewayError::MissingCredentials)?;
        let token = jwt::extract_bearer_token(header).ok_or(GatewayError::MalformedHeader)?;

        // Reject oversized input before touching the key cache
        if token.len() > jwt::MAX_JWT_SIZE_BYTES {
            return Err(GatewayError::InvalidToken(jwt::TokenError::TooLarge));
        }

        let key = self.key_cache.get_key().await?;
        let claims = jwt::verify_token(token, &key)?;
        claims.require_kind(TokenKind::Access)?;

        Ok(claims.identity())
    }
}
