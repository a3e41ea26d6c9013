//! Metrics definitions for the gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gateway_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `status`: success, error (validations also use `anonymous`)
//! - `reason`: bounded set from `GatewayError::reason`
//! - `backend`: names from the static registry, or `unknown`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle used by `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder cannot be installed (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("gateway_proxy_duration_seconds".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
                30.000,
            ],
        )
        .map_err(|e| format!("Failed to set proxy duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record a token validation outcome
///
/// Metric: `gateway_token_validations_total`
/// Labels: `status`, `reason`
pub fn record_token_validation(status: &str, reason: &str) {
    counter!(
        "gateway_token_validations_total",
        "status" => status.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a public key fetch against the issuer
///
/// Metric: `gateway_public_key_fetches_total`
/// Labels: `status`
pub fn record_public_key_fetch(status: &str) {
    counter!("gateway_public_key_fetches_total", "status" => status.to_string()).increment(1);
}

/// Record a proxied request
///
/// Metric: `gateway_proxy_requests_total`, `gateway_proxy_duration_seconds`
/// Labels: `backend`, `status` (upstream status code, or the error reason)
pub fn record_proxy_request(backend: &str, status: &str, duration: Duration) {
    counter!(
        "gateway_proxy_requests_total",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!("gateway_proxy_duration_seconds", "backend" => backend.to_string())
        .record(duration.as_secs_f64());
}

/// Record a retried upstream attempt
///
/// Metric: `gateway_proxy_retries_total`
/// Labels: `backend`
pub fn record_proxy_retry(backend: &str) {
    counter!("gateway_proxy_retries_total", "backend" => backend.to_string()).increment(1);
}
