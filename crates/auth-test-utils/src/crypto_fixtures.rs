//! Fixed RSA key fixtures for testing
//!
//! 2048-bit keys generated once with openssl and checked in. The primary key
//! plays the issuer; the foreign key signs tokens that must be rejected.

use jsonwebtoken::{DecodingKey, EncodingKey};

/// Issuer signing key, PKCS#8 PEM.
pub const PRIMARY_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/primary_private.pem");

/// Issuer public key, SPKI PEM. This is what `/api/v1/auth/public-key` serves
/// when the harness runs with the primary key.
pub const PRIMARY_PUBLIC_KEY_PEM: &str = include_str!("../fixtures/primary_public.pem");

/// Key unrelated to the issuer, PKCS#8 PEM.
pub const FOREIGN_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/foreign_private.pem");

/// Public half of the foreign key, SPKI PEM.
pub const FOREIGN_PUBLIC_KEY_PEM: &str = include_str!("../fixtures/foreign_public.pem");

pub fn primary_encoding_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(PRIMARY_PRIVATE_KEY_PEM.as_bytes())
        .expect("primary fixture key is valid PEM")
}

pub fn primary_decoding_key() -> DecodingKey {
    DecodingKey::from_rsa_pem(PRIMARY_PUBLIC_KEY_PEM.as_bytes())
        .expect("primary fixture public key is valid PEM")
}

pub fn foreign_encoding_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(FOREIGN_PRIVATE_KEY_PEM.as_bytes())
        .expect("foreign fixture key is valid PEM")
}
