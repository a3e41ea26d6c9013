//! Local token validation for the gateway.
//!
//! # Components
//!
//! - `key_cache` - Fetches and caches the issuer's public key
//! - `authenticator` - Validates bearer tokens against the cached key

pub mod authenticator;
pub mod key_cache;

pub use authenticator::RequestAuthenticator;
pub use key_cache::{PublicKeyCache, FAILED_FETCH_BACKOFF, PUBLIC_KEY_CACHE_TTL};
