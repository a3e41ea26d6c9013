//! Proxy forwarder.
//!
//! Forwards an authorized request to the backend registered under the first
//! path segment after `/api/v1`. The inbound body is buffered (bounded by
//! `max_request_body_bytes`) so the request can be replayed on retry; the
//! upstream response body is streamed back without buffering.
//!
//! Connect errors are retried for every method, since nothing reached the
//! backend. Timeouts are retried only for idempotent methods; a timed-out
//! POST may already have been applied. Any response that arrives, whatever
//! its status, is relayed as-is.

use crate::config::Config;
use crate::errors::GatewayError;
use crate::observability::metrics;
use crate::services::path::ensure_canonical_path;
use crate::services::registry::BackendRegistry;
use axum::{
    body::{self, Body},
    extract::Request,
    http::{header, HeaderMap, HeaderName, Method},
    response::Response,
};
use std::time::{Duration, Instant};
use tracing::instrument;

/// Headers that describe a single transport hop and are never forwarded.
static HOP_BY_HOP_HEADERS: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
];

/// Timeout and retry policy for upstream calls.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    /// Per-attempt timeout, covering connect through end of body.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_request_body_bytes: usize,
}

impl From<&Config> for ProxySettings {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.proxy_timeout,
            max_retries: config.proxy_max_retries,
            retry_delay: config.proxy_retry_delay,
            max_request_body_bytes: config.max_request_body_bytes,
        }
    }
}

impl ProxySettings {
    /// Worst-case wall time of one forwarded request, used to size the
    /// outer request timeout so it never cuts a retry sequence short.
    pub fn worst_case_duration(&self) -> Duration {
        let attempts = self.max_retries.saturating_add(1);
        self.timeout
            .saturating_mul(attempts)
            .saturating_add(self.retry_delay.saturating_mul(self.max_retries))
    }
}

pub struct ProxyForwarder {
    registry: BackendRegistry,
    http_client: reqwest::Client,
    settings: ProxySettings,
}

impl ProxyForwarder {
    pub fn new(registry: BackendRegistry, settings: ProxySettings) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(
                    target: "gateway.proxy",
                    error = %e,
                    "Failed to build proxy HTTP client with custom config, using defaults"
                );
                reqwest::Client::new()
            });

        Self {
            registry,
            http_client,
            settings,
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    /// Forward `req` to the backend registered as `backend`.
    ///
    /// The target URL is the backend base URL followed by the original path
    /// and query. Method, body, and end-to-end headers are preserved.
    ///
    /// # Errors
    ///
    /// - `UnknownBackend` if no backend is registered under the name
    /// - `RequestTooLarge` if the body exceeds the configured limit
    /// - `BackendUnavailable` if the backend cannot be reached after retries
    /// - `InternalProxyError` if the outbound request cannot be built
    #[instrument(skip_all, name = "gateway.proxy.forward", fields(backend = %backend))]
    pub async fn forward(&self, backend: &str, req: Request) -> Result<Response, GatewayError> {
        let start = Instant::now();
        let result = self.forward_inner(backend, req).await;

        let label = if self.registry.resolve(backend).is_some() {
            backend
        } else {
            "unknown"
        };
        let status = match &result {
            Ok(response) => response.status().as_str().to_string(),
            Err(e) => e.reason().to_string(),
        };
        metrics::record_proxy_request(label, &status, start.elapsed());

        result
    }

    async fn forward_inner(&self, backend: &str, req: Request) -> Result<Response, GatewayError> {
        let base_url = self
            .registry
            .resolve(backend)
            .ok_or_else(|| GatewayError::UnknownBackend(backend.to_string()))?;

        let (parts, inbound_body) = req.into_parts();
        ensure_canonical_path(parts.uri.path())?;

        let limit = self.settings.max_request_body_bytes;
        if declared_content_length(&parts.headers).is_some_and(|len| len > limit) {
            return Err(GatewayError::RequestTooLarge);
        }
        let body = body::to_bytes(inbound_body, limit)
            .await
            .map_err(|_| GatewayError::RequestTooLarge)?;

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target_url = format!("{}{}", base_url, path_and_query);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        // reqwest computes the length of the buffered body
        headers.remove(header::CONTENT_LENGTH);

        let mut attempt: u32 = 0;
        loop {
            let outbound = self
                .http_client
                .request(parts.method.clone(), &target_url)
                .headers(headers.clone())
                .body(body.clone())
                .build()
                .map_err(|e| GatewayError::InternalProxyError(e.to_string()))?;

            match self.http_client.execute(outbound).await {
                Ok(upstream) => {
                    tracing::debug!(
                        target: "gateway.proxy",
                        backend = %backend,
                        status = upstream.status().as_u16(),
                        attempts = attempt + 1,
                        "Upstream responded"
                    );
                    return Ok(relay_response(upstream));
                }
                Err(e) if is_retryable(&parts.method, &e) && attempt < self.settings.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        target: "gateway.proxy",
                        backend = %backend,
                        attempt = attempt,
                        error = %e,
                        "Transient upstream failure, retrying"
                    );
                    metrics::record_proxy_retry(backend);
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                Err(e) if e.is_builder() => {
                    return Err(GatewayError::InternalProxyError(e.to_string()));
                }
                Err(e) => {
                    tracing::error!(
                        target: "gateway.proxy",
                        backend = %backend,
                        attempts = attempt + 1,
                        error = %e,
                        "Upstream unavailable"
                    );
                    return Err(GatewayError::BackendUnavailable(backend.to_string()));
                }
            }
        }
    }
}

fn is_retryable(method: &Method, err: &reqwest::Error) -> bool {
    err.is_connect() || (err.is_timeout() && method.is_idempotent())
}

fn declared_content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Remove hop-by-hop headers, including any named in `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP_HEADERS.iter()) {
        headers.remove(name);
    }

    let proxy_headers: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with("proxy-"))
        .cloned()
        .collect();
    for name in proxy_headers {
        headers.remove(name);
    }
}

fn relay_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
