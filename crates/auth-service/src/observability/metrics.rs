//! Metrics definitions for the auth service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `operation`: login, refresh
//! - `status`: success, error
//! - `outcome`: success, user_not_found, invalid_password, error

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
        // bcrypt dominates issuance latency, so buckets start at 50ms
        .set_buckets_for_metric(
            Matcher::Prefix("auth_token_issuance".to_string()),
            &[0.050, 0.100, 0.150, 0.200, 0.250, 0.350, 0.500, 1.000, 2.000],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record token issuance duration and outcome
///
/// Metric: `auth_token_issuance_duration_seconds`, `auth_token_issuance_total`
/// Labels: `operation`, `status`
pub fn record_token_issuance(operation: &str, status: &str, duration: Duration) {
    histogram!("auth_token_issuance_duration_seconds", "operation" => operation.to_string(), "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("auth_token_issuance_total", "operation" => operation.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record a login attempt
///
/// Metric: `auth_login_attempts_total`
/// Labels: `outcome`
pub fn record_login_attempt(outcome: &str) {
    counter!("auth_login_attempts_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a logout
///
/// Metric: `auth_logouts_total`
/// Labels: `revoked`
pub fn record_logout(revoked: bool) {
    counter!("auth_logouts_total", "revoked" => revoked.to_string()).increment(1);
}

/// Record a public key fetch
///
/// Metric: `auth_public_key_requests_total`
pub fn record_public_key_request() {
    counter!("auth_public_key_requests_total").increment(1);
}
