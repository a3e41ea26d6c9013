//! Utilities and types shared by the auth service and the gateway.

#![warn(clippy::pedantic)]

/// Token codec: claims, signing and local verification
pub mod jwt;

/// Secret types that prevent accidental logging
pub mod secret;

/// Tracing subscriber initialisation
pub mod logging;
