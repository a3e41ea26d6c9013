//! # Auth Test Utilities
//!
//! Shared test utilities for the auth service and for services that validate
//! its tokens.
//!
//! This crate provides:
//! - Fixed RSA key fixtures (RSA generation is too slow to repeat per test)
//! - Token builders for valid and deliberately broken tokens
//! - Server test harness (TestAuthServer for E2E tests)
//! - Fixed test users and IDs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let server = TestAuthServer::spawn().await?;
//!
//!     let token = TestTokenBuilder::access()
//!         .for_user(ALICE_ID)
//!         .expired_seconds_ago(60)
//!         .sign();
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use test_ids::*;
pub use token_builders::*;
