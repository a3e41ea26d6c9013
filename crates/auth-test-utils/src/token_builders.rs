//! Builder patterns for test tokens
//!
//! Produces tokens the issuer would sign as well as tokens no verifier should
//! accept: expired, not yet valid, signed by a foreign key, HS256, or `none`.

use crate::crypto_fixtures::{foreign_encoding_key, primary_encoding_key};
use crate::test_ids::{ALICE_EMAIL, ALICE_ID, TEST_ISSUER};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for signed test tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::access()
///     .for_user(ALICE_ID)
///     .admin(true)
///     .expires_in(600)
///     .sign();
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    foreign_key: bool,
}

impl TestTokenBuilder {
    fn with_type(kind: &str) -> Self {
        let now = Utc::now().timestamp();
        let claims = json!({
            "sub": ALICE_ID,
            "email": ALICE_EMAIL,
            "is_admin": false,
            "type": kind,
            "iss": TEST_ISSUER,
            "iat": now,
            "nbf": now,
            "exp": now + 1800,
        });
        let Value::Object(claims) = claims else {
            unreachable!("json! object literal");
        };
        Self {
            claims,
            foreign_key: false,
        }
    }

    /// Access token for alice, valid for 30 minutes.
    pub fn access() -> Self {
        Self::with_type("access")
    }

    /// Refresh token for alice, valid for 30 minutes.
    pub fn refresh() -> Self {
        Self::with_type("refresh")
    }

    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    pub fn with_email(self, email: &str) -> Self {
        self.with_claim("email", json!(email))
    }

    pub fn admin(self, is_admin: bool) -> Self {
        self.with_claim("is_admin", json!(is_admin))
    }

    /// Set expiration in seconds from now
    pub fn expires_in(self, seconds: i64) -> Self {
        self.with_claim("exp", json!(Utc::now().timestamp() + seconds))
    }

    /// Token whose `exp` passed `seconds` ago
    pub fn expired_seconds_ago(self, seconds: i64) -> Self {
        let now = Utc::now().timestamp();
        self.with_claim("iat", json!(now - seconds - 1800))
            .with_claim("nbf", json!(now - seconds - 1800))
            .with_claim("exp", json!(now - seconds))
    }

    /// Token that only becomes valid `seconds` from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        let nbf = Utc::now().timestamp() + seconds;
        self.with_claim("nbf", json!(nbf))
            .with_claim("exp", json!(nbf + 1800))
    }

    /// Override or add an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Drop a claim entirely
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Sign with the foreign fixture key instead of the issuer's key
    pub fn signed_by_foreign_key(mut self) -> Self {
        self.foreign_key = true;
        self
    }

    /// The claims as JSON, unsigned
    pub fn claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign with RS256
    pub fn sign(self) -> String {
        let key = if self.foreign_key {
            foreign_encoding_key()
        } else {
            primary_encoding_key()
        };
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, &Value::Object(self.claims), &key)
            .expect("fixture token signs")
    }

    /// Sign with HS256 using `secret`
    pub fn sign_hs256(self, secret: &[u8]) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &Value::Object(self.claims),
            &EncodingKey::from_secret(secret),
        )
        .expect("fixture token signs")
    }

    /// `alg: none` token with an empty signature segment
    pub fn unsigned(self) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Value::Object(self.claims)).expect("claims serialize"),
        );
        format!("{}.{}.", header, payload)
    }
}
