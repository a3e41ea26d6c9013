//! HTTP routes for the auth service.

use crate::handlers::auth_handler::{self, AppState};
use crate::handlers::{health_handler, metrics_handler, public_key_handler};
use crate::middleware::auth::require_access_token;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub use crate::observability::metrics::init_metrics_recorder;

/// Build the application routes.
///
/// - `POST /api/v1/auth/login` - exchange credentials for a token pair
/// - `POST /api/v1/auth/refresh` - exchange a refresh token for a new pair
/// - `GET /api/v1/auth/public-key` - PEM public key for local validation
/// - `POST /api/v1/auth/logout` - access token required
/// - `GET /api/v1/auth/me` - access token required
/// - `GET|PUT /api/v1/users/profile` - access token required
/// - `GET /health` (pings the user store), `GET /metrics`
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_handler::health_check))
        .route("/api/v1/auth/login", post(auth_handler::handle_login))
        .route("/api/v1/auth/refresh", post(auth_handler::handle_refresh))
        .route(
            "/api/v1/auth/public-key",
            get(public_key_handler::handle_public_key),
        )
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/api/v1/auth/logout", post(auth_handler::handle_logout))
        .route("/api/v1/auth/me", get(auth_handler::handle_me))
        .route(
            "/api/v1/users/profile",
            get(auth_handler::handle_me).put(auth_handler::handle_update_profile),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_access_token,
        ))
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let app = public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)));

    with_security_headers(app).layer(cors)
}

/// Browser hardening headers on every response. HSTS is left to the TLS
/// terminator in front of the service.
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
            HeaderValue::from_static("auth-service"),
        ))
}
