//! Gateway Service
//!
//! Entry point for the home server API gateway.

use common::logging::init_tracing;
use gateway_service::auth::{PublicKeyCache, RequestAuthenticator};
use gateway_service::config::Config;
use gateway_service::handlers::proxy_handler::AppState;
use gateway_service::middleware::AuthState;
use gateway_service::routes;
use gateway_service::services::{ProxyForwarder, ProxySettings};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing("gateway_service=debug,tower_http=debug", config.log_format)?;

    info!("Starting Gateway");
    info!(
        bind_address = %config.bind_address,
        auth_public_key_url = %config.auth_public_key_url,
        backends = ?config.backends.names().collect::<Vec<_>>(),
        public_paths = ?config.public_paths,
        proxy_timeout_seconds = config.proxy_timeout.as_secs(),
        proxy_max_retries = config.proxy_max_retries,
        "Configuration loaded successfully"
    );

    if config.public_key_stale_grace.is_zero() {
        info!("Public key stale grace disabled, gateway fails closed when the issuer is down");
    } else {
        info!(
            stale_grace_seconds = config.public_key_stale_grace.as_secs(),
            "Expired public keys may be served while the issuer is unreachable"
        );
    }

    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // The key is fetched lazily on the first authenticated request
    let key_cache = Arc::new(PublicKeyCache::new(
        config.auth_public_key_url.clone(),
        config.public_key_fetch_timeout,
        config.public_key_stale_grace,
    ));
    let auth_state = Arc::new(AuthState::new(
        Arc::new(RequestAuthenticator::new(key_cache)),
        config.public_paths.clone(),
    ));

    let proxy = ProxyForwarder::new(config.backends.clone(), ProxySettings::from(&config));
    let state = Arc::new(AppState {
        proxy: Arc::new(proxy),
    });

    if config.cors_allowed_origins.is_empty() {
        info!("No CORS origins configured, allowing any origin without credentials");
    }

    let app = routes::build_routes(
        state,
        auth_state,
        metrics_handle,
        &config.cors_allowed_origins,
    );

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Gateway shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
