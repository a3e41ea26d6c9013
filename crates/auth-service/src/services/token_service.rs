//! Credential validation and token issuance.
//!
//! `login` exchanges email/password for an access + refresh pair, `refresh`
//! exchanges a refresh token for a brand-new pair, and `logout` acknowledges
//! the request through the revocation seam. All three sign with the
//! [`KeyManager`]'s private key.

use crate::config::Config;
use crate::crypto::{self, KeyManager};
use crate::errors::AuthError;
use crate::observability::{hash_for_correlation, metrics};
use crate::repositories::users::UserRepository;
use crate::services::revocation::RevocationList;
use common::jwt::{self, AuthenticatedIdentity, Claims, TokenKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Lifetimes and issuer stamped on every token.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub issuer: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Cost of the stored password hashes, matched by the unknown-user hash.
    pub bcrypt_cost: u32,
}

impl From<&Config> for TokenSettings {
    fn from(config: &Config) -> Self {
        Self {
            issuer: config.jwt_issuer.clone(),
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}

/// A freshly signed access + refresh pair.
#[derive(Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Result of a logout request. `revoked` is `false` unless a real
/// revocation store is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoutOutcome {
    pub revoked: bool,
}

/// Why a login was refused. Never shown to clients; both variants surface as
/// `AuthError::InvalidCredentials`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    UserNotFound,
    InvalidPassword,
}

impl CredentialFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialFailure::UserNotFound => "user_not_found",
            CredentialFailure::InvalidPassword => "invalid_password",
        }
    }
}

pub struct TokenService {
    users: Arc<dyn UserRepository>,
    keys: Arc<KeyManager>,
    revocation: Arc<dyn RevocationList>,
    settings: TokenSettings,
    dummy_hash: String,
}

impl TokenService {
    /// # Errors
    ///
    /// Returns `AuthError::Crypto` if the unknown-user hash cannot be built
    /// at `settings.bcrypt_cost`.
    pub fn new(
        users: Arc<dyn UserRepository>,
        keys: Arc<KeyManager>,
        revocation: Arc<dyn RevocationList>,
        settings: TokenSettings,
    ) -> Result<Self, AuthError> {
        let dummy_hash = crypto::dummy_password_hash(settings.bcrypt_cost)?;
        Ok(Self {
            users,
            keys,
            revocation,
            settings,
            dummy_hash,
        })
    }

    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Authenticate with email and password.
    ///
    /// bcrypt always runs, against a dummy hash when the user is unknown, so
    /// response time does not reveal which emails exist.
    ///
    /// # Errors
    ///
    /// `AuthError::InvalidCredentials` for an unknown user or wrong password,
    /// `AuthError::Database`/`AuthError::Crypto` for infrastructure faults.
    #[instrument(skip_all, fields(email_hash = %hash_for_correlation(email)))]
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let start = Instant::now();

        let user = self.users.find_by_email(email).await?;

        let hash_to_verify = match &user {
            Some(u) => u.password_hash.as_str(),
            None => self.dummy_hash.as_str(),
        };
        let password_ok = crypto::verify_password(password, hash_to_verify)?;

        let user = match user {
            Some(user) if password_ok => user,
            other => {
                let reason = if other.is_none() {
                    CredentialFailure::UserNotFound
                } else {
                    CredentialFailure::InvalidPassword
                };
                tracing::info!(target: "auth.token", reason = reason.as_str(), "Login rejected");
                metrics::record_login_attempt(reason.as_str());
                metrics::record_token_issuance("login", "error", start.elapsed());
                return Err(AuthError::InvalidCredentials);
            }
        };

        let identity = AuthenticatedIdentity {
            subject_id: user.user_id.to_string(),
            email: user.email,
            is_admin: user.is_admin,
        };

        let pair = self.issue_token_pair(&identity);
        let status = if pair.is_ok() { "success" } else { "error" };
        metrics::record_login_attempt(status);
        metrics::record_token_issuance("login", status, start.elapsed());

        if pair.is_ok() {
            tracing::info!(target: "auth.token", user_id = %identity.subject_id, "User logged in");
        }
        pair
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// The identity is taken from the refresh token's claims; no user lookup
    /// is performed.
    ///
    /// # Errors
    ///
    /// `AuthError::InvalidToken` if the token fails verification or is revoked,
    /// `AuthError::InvalidTokenType` if it is an access token.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let start = Instant::now();

        let result = async {
            let claims = self.verify(refresh_token, TokenKind::Refresh)?;

            if self.revocation.is_revoked(&claims).await? {
                tracing::info!(target: "auth.token", "Refresh rejected: token revoked");
                return Err(AuthError::InvalidToken(
                    "The access token is invalid or expired".to_string(),
                ));
            }

            self.issue_token_pair(&claims.identity())
        }
        .await;

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_token_issuance("refresh", status, start.elapsed());
        result
    }

    /// Acknowledge a logout for `caller`.
    ///
    /// The refresh token must be a valid refresh token belonging to the
    /// caller. It is handed to the revocation list; with the default list it
    /// remains usable until expiry and the outcome says so.
    ///
    /// # Errors
    ///
    /// `AuthError::InvalidToken`/`AuthError::InvalidTokenType` for a bad
    /// refresh token or one issued to a different subject.
    #[instrument(skip_all)]
    pub async fn logout(
        &self,
        caller: &AuthenticatedIdentity,
        refresh_token: &str,
    ) -> Result<LogoutOutcome, AuthError> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;

        if claims.sub != caller.subject_id {
            tracing::warn!(
                target: "auth.token",
                "Logout rejected: refresh token belongs to a different subject"
            );
            return Err(AuthError::InvalidToken(
                "The access token is invalid or expired".to_string(),
            ));
        }

        let revoked = self.revocation.revoke(&claims).await?;
        metrics::record_logout(revoked);
        tracing::info!(target: "auth.token", user_id = %caller.subject_id, revoked, "User logged out");

        Ok(LogoutOutcome { revoked })
    }

    /// Sign an access and a refresh token for `identity`.
    ///
    /// # Errors
    ///
    /// `AuthError::Crypto` if signing fails.
    pub fn issue_token_pair(&self, identity: &AuthenticatedIdentity) -> Result<TokenPair, AuthError> {
        let access_token = jwt::sign_token(
            identity,
            TokenKind::Access,
            self.keys.encoding_key(),
            &self.settings.issuer,
            self.settings.access_token_ttl,
        )?;
        let refresh_token = jwt::sign_token(
            identity,
            TokenKind::Refresh,
            self.keys.encoding_key(),
            &self.settings.issuer,
            self.settings.refresh_token_ttl,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.settings.access_token_ttl.as_secs(),
        })
    }

    /// Verify a token against this service's own public key and require `kind`.
    ///
    /// # Errors
    ///
    /// See [`AuthError::from`] for the `TokenError` mapping.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let claims = jwt::verify_token(token, self.keys.decoding_key()).map_err(|e| {
            tracing::debug!(target: "auth.token", reason = e.reason(), "Token verification failed");
            AuthError::from(e)
        })?;
        claims.require_kind(kind)?;
        Ok(claims)
    }
}
