//! HTTP routes for the gateway.

use crate::handlers::proxy_handler::{self, AppState};
use crate::handlers::{health_handler, metrics_handler};
use crate::middleware::{authenticate_request, AuthState};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{any, get},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub use crate::observability::metrics::init_metrics_recorder;

/// Headroom on top of the worst-case key fetch plus proxy retry sequence.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// Build the application routes.
///
/// - `GET /health`, `GET /metrics` - unauthenticated
/// - `ANY /api/v1/:service[/*path]` - authenticated per path policy, then
///   forwarded to the backend registered as `service`
///
/// CORS preflights are answered before authentication. Every response gets
/// the security headers, without replacing ones a backend already set.
pub fn build_routes(
    state: Arc<AppState>,
    auth_state: Arc<AuthState>,
    metrics_handle: PrometheusHandle,
    cors_allowed_origins: &[HeaderValue],
) -> Router {
    // The outer timeout must never fire before the proxy gives up on its own
    let request_timeout = state
        .proxy
        .settings()
        .worst_case_duration()
        .saturating_add(auth_state.authenticator.key_cache().fetch_timeout())
        .saturating_add(REQUEST_TIMEOUT_SLACK);

    let public_routes = Router::new().route("/health", get(health_handler::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler::metrics_handler))
        .with_state(metrics_handle);

    let proxied_routes = Router::new()
        .route("/api/v1/:service", any(proxy_handler::handle_proxy))
        .route("/api/v1/:service/*path", any(proxy_handler::handle_proxy))
        .route_layer(middleware::from_fn_with_state(
            auth_state,
            authenticate_request,
        ))
        .with_state(state);

    let app = public_routes
        .merge(metrics_routes)
        .merge(proxied_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout));

    with_security_headers(app).layer(cors_layer(cors_allowed_origins))
}

/// Any origin without credentials when no origins are configured; otherwise
/// only the listed origins, with credentials.
pub fn cors_layer(allowed_origins: &[HeaderValue]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::CACHE_CONTROL,
            HeaderName::from_static("x-requested-with"),
        ]);

    if allowed_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer
            .allow_origin(AllowOrigin::list(allowed_origins.iter().cloned()))
            .allow_credentials(true)
    }
}

/// HSTS is left to the TLS terminator in front of the gateway.
fn with_security_headers(router: Router) -> Router {
    router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'self'"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static("gateway"),
        ))
}
