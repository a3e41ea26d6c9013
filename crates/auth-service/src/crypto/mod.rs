//! Signing keys and password hashing for the auth service.
//!
//! [`KeyManager`] owns the RSA key pair used to sign every token. It is built
//! once at startup, never mutated, and shared through application state. Only
//! the public half ever leaves the process (as PEM via the public-key
//! endpoint); the private half is written to disk only when key persistence
//! is configured.

use crate::config::{MAX_BCRYPT_COST, MAX_KEY_SIZE_BITS, MIN_BCRYPT_COST, MIN_KEY_SIZE_BITS};
use crate::errors::AuthError;
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tracing::instrument;

/// The issuer's RS256 key pair.
pub struct KeyManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_key_pem: String,
    key_size_bits: usize,
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("private_key", &"[REDACTED]")
            .field("key_size_bits", &self.key_size_bits)
            .finish()
    }
}

impl KeyManager {
    /// Generate a fresh key pair with a `bits`-bit modulus.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Crypto` if `bits` is outside 2048..=8192 or the
    /// RNG fails.
    #[instrument(skip_all)]
    pub fn generate(bits: usize) -> Result<Self, AuthError> {
        Self::generate_with_pem(bits).map(|(manager, _)| manager)
    }

    /// Load a key pair from a PKCS#8 PEM private key.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Crypto` if the PEM does not hold an RSA key of at
    /// least 2048 bits.
    #[instrument(skip_all)]
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, AuthError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| AuthError::Crypto(format!("Invalid private key PEM: {}", e)))?;

        let bits = private_key.size() * 8;
        if bits < MIN_KEY_SIZE_BITS {
            return Err(AuthError::Crypto(format!(
                "Private key is {} bits, minimum is {}",
                bits, MIN_KEY_SIZE_BITS
            )));
        }

        Self::from_private_key(&private_key).map(|(manager, _)| manager)
    }

    /// Load the signing key from `path` if it exists, otherwise generate one
    /// and write it there. With no path the key lives only in memory and every
    /// token issued before a restart becomes unverifiable.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Crypto` on I/O failure, an unparsable key file, or
    /// a generation failure.
    pub fn load_or_generate(path: Option<&Path>, bits: usize) -> Result<Self, AuthError> {
        let Some(path) = path else {
            tracing::warn!(
                target: "auth.crypto",
                "No JWT_PRIVATE_KEY_PATH configured; using an ephemeral signing key. Issued tokens will not survive a restart"
            );
            return Self::generate(bits);
        };

        if path.exists() {
            let pem = std::fs::read_to_string(path).map_err(|e| {
                AuthError::Crypto(format!(
                    "Failed to read signing key {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let manager = Self::from_pkcs8_pem(&pem)?;
            tracing::info!(
                target: "auth.crypto",
                path = %path.display(),
                key_size_bits = manager.key_size_bits,
                "Loaded signing key"
            );
            return Ok(manager);
        }

        let (manager, private_pem) = Self::generate_with_pem(bits)?;
        write_private_key(path, &private_pem)?;
        tracing::info!(
            target: "auth.crypto",
            path = %path.display(),
            key_size_bits = bits,
            "Generated and persisted new signing key"
        );
        Ok(manager)
    }

    /// Public key as SPKI PEM (`-----BEGIN PUBLIC KEY-----`).
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    pub fn key_size_bits(&self) -> usize {
        self.key_size_bits
    }

    fn generate_with_pem(bits: usize) -> Result<(Self, SecretString), AuthError> {
        if !(MIN_KEY_SIZE_BITS..=MAX_KEY_SIZE_BITS).contains(&bits) {
            return Err(AuthError::Crypto(format!(
                "Key size must be between {} and {} bits, got {}",
                MIN_KEY_SIZE_BITS, MAX_KEY_SIZE_BITS, bits
            )));
        }

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| AuthError::Crypto(format!("Key pair generation failed: {}", e)))?;

        tracing::info!(target: "auth.crypto", key_size_bits = bits, "Generated RSA signing key");
        Self::from_private_key(&private_key)
    }

    fn from_private_key(private_key: &RsaPrivateKey) -> Result<(Self, SecretString), AuthError> {
        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AuthError::Crypto(format!("Private key encoding failed: {}", e)))?;
        let private_pem = SecretString::from(private_pem.as_str());

        let public_key = RsaPublicKey::from(private_key);
        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuthError::Crypto(format!("Public key encoding failed: {}", e)))?;

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.expose_secret().as_bytes())
            .map_err(|e| AuthError::Crypto(format!("Invalid signing key: {}", e)))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| AuthError::Crypto(format!("Invalid verification key: {}", e)))?;

        Ok((
            Self {
                encoding_key,
                decoding_key,
                public_key_pem,
                key_size_bits: private_key.size() * 8,
            },
            private_pem,
        ))
    }
}

fn write_private_key(path: &Path, pem: &SecretString) -> Result<(), AuthError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AuthError::Crypto(format!(
                "Failed to create key directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| {
        AuthError::Crypto(format!(
            "Failed to create signing key file {}: {}",
            path.display(),
            e
        ))
    })?;
    file.write_all(pem.expose_secret().as_bytes())
        .map_err(|e| AuthError::Crypto(format!("Failed to write signing key: {}", e)))?;

    Ok(())
}

/// Hash a password with bcrypt.
///
/// # Errors
///
/// Returns `AuthError::Crypto` if `cost` is outside 10..=14 or hashing fails.
#[instrument(skip_all)]
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(AuthError::Crypto(format!(
            "Invalid bcrypt cost: {} (must be {}-{})",
            cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }
    bcrypt::hash(password, cost)
        .map_err(|e| AuthError::Crypto(format!("Password hashing failed: {}", e)))
}

/// Bcrypt hash of a random string at `cost`, verified against when the
/// requested user does not exist so that both failure paths cost the same.
///
/// Unlike [`hash_password`] the cost is not range-checked here; it only has
/// to match the cost of the stored hashes.
///
/// # Errors
///
/// Returns `AuthError::Crypto` if bcrypt rejects the cost.
pub fn dummy_password_hash(cost: u32) -> Result<String, AuthError> {
    let filler: [u8; 16] = rand::random();
    bcrypt::hash(hex::encode(filler), cost)
        .map_err(|e| AuthError::Crypto(format!("Dummy hash generation failed: {}", e)))
}

/// Compare a password against a stored bcrypt hash.
///
/// # Errors
///
/// Returns `AuthError::Crypto` if `hash` is not a bcrypt hash.
#[instrument(skip_all)]
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash)
        .map_err(|e| AuthError::Crypto(format!("Password verification failed: {}", e)))
}
