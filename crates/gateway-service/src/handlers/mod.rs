pub mod health_handler;
pub mod metrics_handler;
pub mod proxy_handler;
