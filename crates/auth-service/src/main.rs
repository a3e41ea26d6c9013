//! Auth Service
//!
//! Entry point for the home server token issuer.

use auth_service::config::{self, Config};
use auth_service::crypto::{self, KeyManager};
use auth_service::handlers::auth_handler::AppState;
use auth_service::repositories::users::PgUserRepository;
use auth_service::routes;
use auth_service::services::revocation::NoRevocation;
use auth_service::services::token_service::{TokenService, TokenSettings};
use common::logging::init_tracing;
use std::io::BufRead;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // `auth-service hash-password` reads a password from stdin and prints a
    // bcrypt hash suitable for the users table. It needs only BCRYPT_COST.
    if std::env::args().nth(1).as_deref() == Some("hash-password") {
        let cost = config::bcrypt_cost_from_env().map_err(|e| {
            eprintln!("Failed to load configuration: {}", e);
            e
        })?;
        return hash_password_from_stdin(cost);
    }

    // Load configuration before tracing so LOG_FORMAT applies from the first line
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing("auth_service=debug,tower_http=debug", config.log_format)?;

    info!("Starting Auth Service");
    info!(
        bind_address = %config.bind_address,
        issuer = %config.jwt_issuer,
        access_token_ttl_seconds = config.access_token_ttl.as_secs(),
        refresh_token_ttl_seconds = config.refresh_token_ttl.as_secs(),
        "Configuration loaded successfully"
    );

    info!("Connecting to database...");
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| {
            error!("Failed to apply database migrations: {}", e);
            e
        })?;

    // A missing signing key is fatal: the service must not start without one
    info!("Initializing signing key...");
    let keys = KeyManager::load_or_generate(config.private_key_path.as_deref(), config.key_size_bits)
        .map_err(|e| {
            error!("Failed to initialize signing key: {}", e);
            e
        })?;

    info!(key_size_bits = keys.key_size_bits(), "Signing key initialized");

    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let token_service = TokenService::new(
        Arc::new(PgUserRepository::new(db_pool)),
        Arc::new(keys),
        Arc::new(NoRevocation),
        TokenSettings::from(&config),
    )
    .map_err(|e| {
        error!("Failed to initialize token service: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        token_service: Arc::new(token_service),
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Auth Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Auth Service shutdown complete");

    Ok(())
}

fn hash_password_from_stdin(cost: u32) -> Result<(), Box<dyn std::error::Error>> {
    let mut password = String::new();
    std::io::stdin().lock().read_line(&mut password)?;
    let password = password.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err("No password provided on stdin".into());
    }

    let hash = crypto::hash_password(password, cost)?;
    println!("{}", hash);
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
