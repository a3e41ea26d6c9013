//! Auth Service Library
//!
//! Token issuer for the home server gateway. Verifies user credentials and
//! issues RS256-signed access/refresh token pairs, and publishes the public
//! key so other services can validate tokens locally.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `crypto` - Signing key management and password hashing
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - Access token middleware for protected routes
//! - `models` - Response bodies
//! - `repositories` - User storage
//! - `routes` - Router construction
//! - `services` - Credential validation and token issuance

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
