//! Secret wrappers for values that must never reach a log line.
//!
//! Re-exports [`secrecy`]. `SecretString` redacts itself in `Debug`, so any
//! request struct deriving `Debug` stays safe to trace. Use it for:
//! - login passwords
//! - refresh tokens submitted in request bodies
//! - PEM-encoded private key material
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug, serde::Deserialize)]
//! struct LoginRequest {
//!     email: String,
//!     password: SecretString,
//! }
//!
//! let req: LoginRequest =
//!     serde_json::from_str(r#"{"email": "a@b.c", "password": "pw"}"#).unwrap();
//! assert!(!format!("{req:?}").contains("\"pw\""));
//! assert_eq!(req.password.expose_secret(), "pw");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
