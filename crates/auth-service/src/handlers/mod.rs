pub mod auth_handler;
pub mod extract;
pub mod health_handler;
pub mod metrics_handler;
pub mod public_key_handler;
