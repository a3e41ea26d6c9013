//! Token codec shared by the issuer and the gateway.
//!
//! Tokens are RS256-signed JWTs carrying [`Claims`]. The issuer signs with its
//! private key; the gateway verifies locally with the cached public key.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The header `alg` must be `RS256`; anything else is rejected before any
//!   signature work
//! - `exp` and `nbf` are checked against the caller's clock with zero leeway
//! - Error messages are generic; the precise failure is available through
//!   [`TokenError::reason`] for logs and metrics
//! - `sub` and `email` are redacted in `Debug` output

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted token size in bytes (8KB).
///
/// Larger tokens are rejected before base64 decoding or signature checks.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// The only algorithm tokens are signed and verified with.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// Header value of [`SIGNING_ALGORITHM`] as it appears on the wire.
pub const SIGNING_ALGORITHM_NAME: &str = "RS256";

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while signing or verifying tokens.
///
/// Verification variants share one client-facing message. Use
/// [`TokenError::reason`] when the distinction matters (logs, metrics).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The access token is invalid or expired")]
    TooLarge,

    /// Not a structurally valid JWT, or claims are missing/mistyped.
    #[error("The access token is invalid or expired")]
    Malformed,

    /// Signature does not verify under the supplied public key.
    #[error("The access token is invalid or expired")]
    SignatureInvalid,

    /// `now >= exp`.
    #[error("The access token is invalid or expired")]
    Expired,

    /// `now < nbf`.
    #[error("The access token is invalid or expired")]
    NotYetValid,

    /// Header declares an algorithm other than RS256.
    #[error("The access token is invalid or expired")]
    WrongAlgorithm,

    /// Token kind does not match what the caller requires.
    #[error("The access token is invalid or expired")]
    WrongTokenType,

    /// Signing failed (bad key material or serialization failure).
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    /// Bounded label describing the failure, suitable for metric labels.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::TooLarge => "too_large",
            TokenError::Malformed => "malformed",
            TokenError::SignatureInvalid => "signature_invalid",
            TokenError::Expired => "expired",
            TokenError::NotYetValid => "not_yet_valid",
            TokenError::WrongAlgorithm => "wrong_algorithm",
            TokenError::WrongTokenType => "wrong_token_type",
            TokenError::Signing(_) => "signing_failed",
        }
    }
}

// =============================================================================
// Claims Types
// =============================================================================

/// Kind of token. Access tokens authorize API calls; refresh tokens are only
/// good for minting a new pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated principal derived from validated claims.
///
/// Lives for a single request on the gateway side.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub subject_id: String,
    pub email: String,
    pub is_admin: bool,
}

impl fmt::Debug for AuthenticatedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedIdentity")
            .field("subject_id", &self.subject_id)
            .field("email", &"[REDACTED]")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

/// Signed token payload.
///
/// Timestamps are Unix epoch seconds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id) - redacted in Debug output.
    pub sub: String,

    /// User email - redacted in Debug output.
    pub email: String,

    pub is_admin: bool,

    #[serde(rename = "type")]
    pub kind: TokenKind,

    pub iss: String,

    pub iat: i64,

    pub nbf: i64,

    pub exp: i64,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("email", &"[REDACTED]")
            .field("is_admin", &self.is_admin)
            .field("kind", &self.kind)
            .field("iss", &self.iss)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("exp", &self.exp)
            .finish()
    }
}

impl Claims {
    /// Identity carried by these claims.
    #[must_use]
    pub fn identity(&self) -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            subject_id: self.sub.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
        }
    }

    /// Reject claims whose kind differs from `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::WrongTokenType`] on mismatch.
    pub fn require_kind(&self, expected: TokenKind) -> Result<(), TokenError> {
        if self.kind == expected {
            Ok(())
        } else {
            tracing::debug!(
                target: "common.jwt",
                expected = %expected,
                actual = %self.kind,
                "Token rejected: wrong token type"
            );
            Err(TokenError::WrongTokenType)
        }
    }
}

// =============================================================================
// Signing
// =============================================================================

/// Sign a token for `identity` valid from now until now + `ttl`.
///
/// # Errors
///
/// Returns [`TokenError::Signing`] if the key cannot produce an RS256
/// signature.
pub fn sign_token(
    identity: &AuthenticatedIdentity,
    kind: TokenKind,
    key: &EncodingKey,
    issuer: &str,
    ttl: Duration,
) -> Result<String, TokenError> {
    sign_token_at(
        identity,
        kind,
        key,
        issuer,
        ttl,
        chrono::Utc::now().timestamp(),
    )
}

/// Deterministic variant of [`sign_token`] with an explicit `now`.
///
/// # Errors
///
/// See [`sign_token`].
pub fn sign_token_at(
    identity: &AuthenticatedIdentity,
    kind: TokenKind,
    key: &EncodingKey,
    issuer: &str,
    ttl: Duration,
    now: i64,
) -> Result<String, TokenError> {
    let ttl_secs = i64::try_from(ttl.as_secs())
        .map_err(|_| TokenError::Signing("token lifetime out of range".to_string()))?;

    let claims = Claims {
        sub: identity.subject_id.clone(),
        email: identity.email.clone(),
        is_admin: identity.is_admin,
        kind,
        iss: issuer.to_string(),
        iat: now,
        nbf: now,
        exp: now.saturating_add(ttl_secs),
    };

    let mut header = Header::new(SIGNING_ALGORITHM);
    header.typ = Some("JWT".to_string());

    encode(&header, &claims, key).map_err(|e| {
        tracing::error!(target: "common.jwt", error = %e, "Token signing failed");
        TokenError::Signing(e.to_string())
    })
}

// =============================================================================
// Verification
// =============================================================================

/// Verify `token` under `key` against the current time.
///
/// Order of checks: size, header algorithm, signature and claim structure,
/// then `exp` and `nbf`.
///
/// # Errors
///
/// Returns the [`TokenError`] variant for the first failing check.
pub fn verify_token(token: &str, key: &DecodingKey) -> Result<Claims, TokenError> {
    verify_token_at(token, key, chrono::Utc::now().timestamp())
}

/// Deterministic variant of [`verify_token`] with an explicit `now`.
///
/// # Errors
///
/// See [`verify_token`].
pub fn verify_token_at(token: &str, key: &DecodingKey, now: i64) -> Result<Claims, TokenError> {
    check_header_algorithm(token)?;

    // Time checks are done below against `now` so tests can pin the clock.
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "nbf"]);

    let claims = decode::<Claims>(token, key, &validation)
        .map_err(|e| {
            let mapped = match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidKeyFormat => TokenError::SignatureInvalid,
                ErrorKind::InvalidAlgorithm => TokenError::WrongAlgorithm,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::ImmatureSignature => TokenError::NotYetValid,
                _ => TokenError::Malformed,
            };
            tracing::debug!(target: "common.jwt", error = %e, reason = mapped.reason(), "Token verification failed");
            mapped
        })?
        .claims;

    if now >= claims.exp {
        tracing::debug!(target: "common.jwt", exp = claims.exp, now, "Token rejected: expired");
        return Err(TokenError::Expired);
    }
    if now < claims.nbf {
        tracing::debug!(target: "common.jwt", nbf = claims.nbf, now, "Token rejected: not yet valid");
        return Err(TokenError::NotYetValid);
    }

    Ok(claims)
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively. Returns `None` for any other
/// scheme or an empty token.
#[must_use]
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(' ') {
        return None;
    }
    Some(token)
}

/// Size-check the token and confirm its header declares RS256.
fn check_header_algorithm(token: &str) -> Result<(), TokenError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(TokenError::TooLarge);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(target: "common.jwt", parts = parts.len(), "Token rejected: invalid JWT format");
        return Err(TokenError::Malformed);
    }

    let header_part = parts.first().ok_or(TokenError::Malformed)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        TokenError::Malformed
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        TokenError::Malformed
    })?;

    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .ok_or(TokenError::Malformed)?;

    if alg != SIGNING_ALGORITHM_NAME {
        tracing::debug!(target: "common.jwt", alg = %alg, "Token rejected: unexpected algorithm");
        return Err(TokenError::WrongAlgorithm);
    }

    Ok(())
}
