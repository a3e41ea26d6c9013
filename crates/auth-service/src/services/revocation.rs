//! Revocation seam.
//!
//! Tokens are stateless, so out of the box nothing can be revoked: a logged
//! out refresh token stays valid until it expires. A store-backed
//! [`RevocationList`] can be injected into the token service without touching
//! the login, refresh, or logout flows.

use crate::errors::AuthError;
use async_trait::async_trait;
use common::jwt::Claims;

#[async_trait]
pub trait RevocationList: Send + Sync {
    /// Record that `claims` may no longer be used. Returns `true` only if the
    /// token is now actually rejected by [`RevocationList::is_revoked`].
    async fn revoke(&self, claims: &Claims) -> Result<bool, AuthError>;

    async fn is_revoked(&self, claims: &Claims) -> Result<bool, AuthError>;
}

/// Default list: accepts every token and revokes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRevocation;

#[async_trait]
impl RevocationList for NoRevocation {
    async fn revoke(&self, _claims: &Claims) -> Result<bool, AuthError> {
        Ok(false)
    }

    async fn is_revoked(&self, _claims: &Claims) -> Result<bool, AuthError> {
        Ok(false)
    }
}
