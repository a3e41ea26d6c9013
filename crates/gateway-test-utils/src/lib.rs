//! # Gateway Test Utilities
//!
//! Shared test utilities for the gateway.
//!
//! This crate provides:
//! - Server test harness (TestGatewayServer for E2E tests)
//! - Mock issuer serving the fixture public key
//!
//! Token builders and key fixtures live in `auth-test-utils`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let issuer = MockIssuer::start().await;
//!     let gateway = TestGatewayServer::spawn(
//!         TestGatewayOptions::new(issuer.public_key_url())
//!             .backend("stats", "http://127.0.0.1:9000"),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod mock_issuer;
pub mod server_harness;

pub use mock_issuer::*;
pub use server_harness::*;
