//! Observability for the auth service.
//!
//! Instrumented functions use `#[instrument(skip_all)]` and add fields
//! explicitly. Emails are never logged in plaintext; use
//! [`hash_for_correlation`] when a log line needs to be tied to an account.

pub mod metrics;

use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars).
///
/// Not a secret-protection mechanism, only a stable short tag.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest.get(..4).unwrap_or_default())
}
