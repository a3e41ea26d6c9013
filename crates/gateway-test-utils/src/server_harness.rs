//! Test server harness for E2E testing
//!
//! Provides TestGatewayServer for spawning a real gateway in tests against
//! any issuer URL and any set of backends.

use gateway_service::auth::{PublicKeyCache, RequestAuthenticator, PUBLIC_KEY_CACHE_TTL};
use gateway_service::handlers::proxy_handler::AppState;
use gateway_service::middleware::AuthState;
use gateway_service::routes;
use axum::http::HeaderValue;
use gateway_service::services::{BackendRegistry, ProxyForwarder, ProxySettings};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Options for [`TestGatewayServer::spawn`].
///
/// Defaults favor fast tests: a 2s proxy timeout, one retry after 10ms, and
/// the production public paths.
pub struct TestGatewayOptions {
    pub public_key_url: String,
    pub backends: Vec<(String, String)>,
    pub public_paths: Vec<String>,
    pub proxy: ProxySettings,
    pub fetch_timeout: Duration,
    pub stale_grace: Duration,
    pub key_cache_ttl: Duration,
    pub cors_allowed_origins: Vec<HeaderValue>,
}

impl TestGatewayOptions {
    pub fn new(public_key_url: impl Into<String>) -> Self {
        Self {
            public_key_url: public_key_url.into(),
            backends: Vec::new(),
            public_paths: vec![
                "/api/v1/auth/login".to_string(),
                "/api/v1/auth/refresh".to_string(),
                "/api/v1/auth/public-key".to_string(),
            ],
            proxy: ProxySettings {
                timeout: Duration::from_secs(2),
                max_retries: 1,
                retry_delay: Duration::from_millis(10),
                max_request_body_bytes: 1024 * 1024,
            },
            fetch_timeout: Duration::from_secs(2),
            stale_grace: Duration::ZERO,
            key_cache_ttl: PUBLIC_KEY_CACHE_TTL,
            cors_allowed_origins: Vec::new(),
        }
    }

    pub fn backend(mut self, name: &str, url: impl Into<String>) -> Self {
        self.backends.push((name.to_string(), url.into()));
        self
    }

    /// Add a prefix served under the optional policy.
    pub fn public_path(mut self, prefix: &str) -> Self {
        self.public_paths.push(prefix.to_string());
        self
    }

    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn stale_grace(mut self, grace: Duration) -> Self {
        self.stale_grace = grace;
        self
    }

    pub fn key_cache_ttl(mut self, ttl: Duration) -> Self {
        self.key_cache_ttl = ttl;
        self
    }
}

/// Test harness for spawning the gateway in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_proxy_flow() -> Result<()> {
///     let auth = TestAuthServer::spawn().await?;
///     let gateway = TestGatewayServer::spawn(
///         TestGatewayOptions::new(auth.public_key_url()).backend("auth", auth.url()),
///     )
///     .await?;
///     let response = reqwest::get(format!("{}/health", gateway.url())).await?;
///     assert!(response.status().is_success());
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    key_cache: Arc<PublicKeyCache>,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a gateway bound to a random local port.
    pub async fn spawn(options: TestGatewayOptions) -> Result<Self, anyhow::Error> {
        let key_cache = Arc::new(PublicKeyCache::with_ttl(
            options.public_key_url,
            options.fetch_timeout,
            options.stale_grace,
            options.key_cache_ttl,
        ));
        let auth_state = Arc::new(AuthState::new(
            Arc::new(RequestAuthenticator::new(key_cache.clone())),
            options.public_paths,
        ));

        let proxy = ProxyForwarder::new(
            BackendRegistry::from_pairs(options.backends),
            options.proxy,
        );
        let state = Arc::new(AppState {
            proxy: Arc::new(proxy),
        });

        let app = routes::build_routes(
            state,
            auth_state,
            metrics_handle(),
            &options.cors_allowed_origins,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test gateway: {}", e))?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Test gateway failed");
        });

        Ok(Self {
            addr,
            key_cache,
            _handle: handle,
        })
    }

    /// Base URL, e.g. `http://127.0.0.1:54321`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The gateway's key cache, for invalidation or warm checks.
    pub fn key_cache(&self) -> &PublicKeyCache {
        &self.key_cache
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

/// Recorder handle shared by all test gateways in the process.
///
/// The global recorder may be installed only once per process; if another
/// harness got there first, fall back to a detached handle.
fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| {
            routes::init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}
