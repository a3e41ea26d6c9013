//! Gateway Service Library
//!
//! Edge service for the home server. Every request under `/api/v1/` is
//! authenticated locally against the issuer's RS256 public key, which is
//! fetched lazily and cached, and then forwarded to the backend named by the
//! first path segment.
//!
//! # Modules
//!
//! - [`auth`] - public-key cache and request authenticator
//! - [`middleware`] - required/optional authentication middleware
//! - [`services`] - backend registry and proxy forwarder
//! - [`routes`] - router assembly

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod services;
