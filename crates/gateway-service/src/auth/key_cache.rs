//! Public key cache for local token validation.
//!
//! Fetches the issuer's RSA public key from its public-key endpoint and keeps
//! it for [`PUBLIC_KEY_CACHE_TTL`]. Refresh is lazy: the first validation
//! after expiry refetches while holding the write lock, so concurrent callers
//! wait for one fetch instead of issuing their own.
//!
//! A failed fetch never touches the cached key. It is remembered for
//! [`FAILED_FETCH_BACKOFF`], during which callers are answered from the
//! cache state alone: callers queued behind a failed fetch do not repeat it
//! one after another. With a non-zero stale grace the expired key keeps being
//! served for that long while the issuer is unreachable; with zero grace the
//! gateway fails closed.

use crate::errors::GatewayError;
use crate::observability::metrics;
use common::jwt::SIGNING_ALGORITHM_NAME;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// How long a fetched key is trusted before the next refetch.
pub const PUBLIC_KEY_CACHE_TTL: Duration = Duration::from_secs(3600);

/// How long after a failed fetch no new fetch is attempted.
pub const FAILED_FETCH_BACKOFF: Duration = Duration::from_secs(1);

/// Body served by the issuer's public-key endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PublicKeyResponse {
    /// SPKI PEM.
    pub public_key: String,

    pub algorithm: String,

    #[serde(default)]
    pub key_type: Option<String>,
}

struct CachedPublicKey {
    key: Arc<DecodingKey>,
    expires_at: Instant,
}

struct FailedFetch {
    at: Instant,
    reason: String,
}

#[derive(Default)]
struct CacheState {
    entry: Option<CachedPublicKey>,
    last_failure: Option<FailedFetch>,
}

/// Thread-safe, read-heavy cache of the issuer's public key.
pub struct PublicKeyCache {
    public_key_url: String,
    http_client: reqwest::Client,
    fetch_timeout: Duration,
    cache_ttl: Duration,
    stale_grace: Duration,
    failure_backoff: Duration,
    state: RwLock<CacheState>,
}

impl PublicKeyCache {
    /// Create a cache with the standard one hour TTL.
    ///
    /// # Arguments
    ///
    /// * `public_key_url` - Issuer endpoint returning [`PublicKeyResponse`]
    /// * `fetch_timeout` - Bound on a single fetch
    /// * `stale_grace` - How long an expired key may be served while refetches fail
    pub fn new(public_key_url: String, fetch_timeout: Duration, stale_grace: Duration) -> Self {
        Self::with_ttl(public_key_url, fetch_timeout, stale_grace, PUBLIC_KEY_CACHE_TTL)
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(
        public_key_url: String,
        fetch_timeout: Duration,
        stale_grace: Duration,
        cache_ttl: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gateway.auth.key_cache", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            public_key_url,
            http_client,
            fetch_timeout,
            cache_ttl,
            stale_grace,
            failure_backoff: FAILED_FETCH_BACKOFF,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Override [`FAILED_FETCH_BACKOFF`].
    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }

    /// Get the issuer's public key, fetching it if the cache is empty or expired.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::KeyUnavailable` if the key cannot be fetched or
    /// parsed (now or within the failure backoff) and no key within the stale
    /// grace is cached.
    #[instrument(skip_all, name = "gateway.auth.get_public_key")]
    pub async fn get_key(&self) -> Result<Arc<DecodingKey>, GatewayError> {
        {
            let state = self.state.read().await;
            if let Some(answer) = self.answer_from_state(&state) {
                return answer;
            }
        }

        let mut state = self.state.write().await;

        // Another task may have refreshed, or just failed to, while we waited
        if let Some(answer) = self.answer_from_state(&state) {
            return answer;
        }

        match self.fetch().await {
            Ok(key) => {
                metrics::record_public_key_fetch("success");
                let key = Arc::new(key);
                state.entry = Some(CachedPublicKey {
                    key: key.clone(),
                    expires_at: Instant::now() + self.cache_ttl,
                });
                state.last_failure = None;
                tracing::info!(
                    target: "gateway.auth.key_cache",
                    ttl_seconds = self.cache_ttl.as_secs(),
                    "Public key fetched and cached"
                );
                Ok(key)
            }
            Err(reason) => {
                metrics::record_public_key_fetch("error");
                tracing::error!(target: "gateway.auth.key_cache", reason = %reason, "Public key refresh failed");

                state.last_failure = Some(FailedFetch {
                    at: Instant::now(),
                    reason: reason.clone(),
                });
                self.stale_or_unavailable(&state, reason)
            }
        }
    }

    /// Answer without fetching: a fresh key, or the outcome of a failure
    /// still inside the backoff window.
    fn answer_from_state(
        &self,
        state: &CacheState,
    ) -> Option<Result<Arc<DecodingKey>, GatewayError>> {
        let now = Instant::now();
        if let Some(cached) = state.entry.as_ref() {
            if now < cached.expires_at {
                tracing::trace!(target: "gateway.auth.key_cache", "Public key cache hit");
                return Some(Ok(cached.key.clone()));
            }
        }

        let failure = state.last_failure.as_ref()?;
        if now.saturating_duration_since(failure.at) < self.failure_backoff {
            return Some(self.stale_or_unavailable(state, failure.reason.clone()));
        }
        None
    }

    fn stale_or_unavailable(
        &self,
        state: &CacheState,
        reason: String,
    ) -> Result<Arc<DecodingKey>, GatewayError> {
        if let Some(cached) = state.entry.as_ref() {
            let expired_for = Instant::now().saturating_duration_since(cached.expires_at);
            if expired_for < self.stale_grace {
                tracing::warn!(
                    target: "gateway.auth.key_cache",
                    reason = %reason,
                    expired_for_seconds = expired_for.as_secs(),
                    "Serving stale public key"
                );
                return Ok(cached.key.clone());
            }
        }
        Err(GatewayError::KeyUnavailable(reason))
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Drop the cached key so the next validation refetches.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        *state = CacheState::default();
        tracing::info!(target: "gateway.auth.key_cache", "Public key cache invalidated");
    }

    /// Whether a key is cached and not yet expired.
    pub async fn is_warm(&self) -> bool {
        let state = self.state.read().await;
        state
            .entry
            .as_ref()
            .is_some_and(|cached| Instant::now() < cached.expires_at)
    }

    /// Fetch and parse the key. Errors are returned as log-safe strings.
    async fn fetch(&self) -> Result<DecodingKey, String> {
        tracing::debug!(target: "gateway.auth.key_cache", url = %self.public_key_url, "Fetching public key from issuer");

        let response = self
            .http_client
            .get(&self.public_key_url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| format!("Failed to fetch public key: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Public key endpoint returned {}", status));
        }

        let body: PublicKeyResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse public key response: {}", e))?;

        if body.algorithm != SIGNING_ALGORITHM_NAME {
            return Err(format!(
                "Issuer advertises algorithm '{}', expected '{}'",
                body.algorithm, SIGNING_ALGORITHM_NAME
            ));
        }
        if let Some(key_type) = body.key_type.as_deref() {
            if key_type != "RSA" {
                return Err(format!("Issuer advertises key type '{}', expected 'RSA'", key_type));
            }
        }

        DecodingKey::from_rsa_pem(body.public_key.as_bytes())
            .map_err(|e| format!("Failed to parse RSA public key: {}", e))
    }
}
