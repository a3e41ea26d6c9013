//! HTTP middleware for the gateway.

pub mod auth;

pub use auth::{authenticate_request, AuthPolicy, AuthState};
