//! Test server harness for E2E testing
//!
//! Provides TestAuthServer for spawning a real auth service in tests, backed
//! by an in-memory user store and the primary fixture key.

use crate::crypto_fixtures::PRIMARY_PRIVATE_KEY_PEM;
use crate::test_ids::{
    ADMIN_EMAIL, ADMIN_ID, ADMIN_NAME, ADMIN_PASSWORD, ALICE_EMAIL, ALICE_ID, ALICE_NAME,
    ALICE_PASSWORD, TEST_ISSUER,
};
use auth_service::crypto::KeyManager;
use auth_service::handlers::auth_handler::AppState;
use auth_service::repositories::users::{InMemoryUserRepository, User};
use auth_service::routes;
use auth_service::services::revocation::{NoRevocation, RevocationList};
use auth_service::services::token_service::{TokenService, TokenSettings};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// bcrypt cost for fixture users. Below the service minimum to keep tests fast.
const FIXTURE_BCRYPT_COST: u32 = 4;

/// Options for [`TestAuthServer::spawn_with`].
pub struct TestAuthServerOptions {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub revocation: Arc<dyn RevocationList>,
}

impl Default for TestAuthServerOptions {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(1800),
            refresh_token_ttl: Duration::from_secs(604_800),
            revocation: Arc::new(NoRevocation),
        }
    }
}

/// Tokens returned by a successful login through the harness.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Test harness for spawning the auth service in E2E tests
///
/// Seeds two users: alice (regular) and admin, with the passwords in
/// [`crate::test_ids`].
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login_flow() -> Result<()> {
///     let server = TestAuthServer::spawn().await?;
///     let tokens = server.login(ALICE_EMAIL, ALICE_PASSWORD).await?;
///     assert_eq!(tokens.expires_in, 1800);
///     Ok(())
/// }
/// ```
pub struct TestAuthServer {
    addr: SocketAddr,
    users: Arc<InMemoryUserRepository>,
    token_service: Arc<TokenService>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestAuthServer {
    /// Spawn with default token lifetimes and no revocation.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(TestAuthServerOptions::default()).await
    }

    /// Spawn a server bound to a random local port.
    pub async fn spawn_with(options: TestAuthServerOptions) -> Result<Self, anyhow::Error> {
        let users = Arc::new(InMemoryUserRepository::new());
        users.insert(fixture_user(ALICE_ID, ALICE_EMAIL, ALICE_NAME, ALICE_PASSWORD, false)?);
        users.insert(fixture_user(ADMIN_ID, ADMIN_EMAIL, ADMIN_NAME, ADMIN_PASSWORD, true)?);

        let keys = KeyManager::from_pkcs8_pem(PRIMARY_PRIVATE_KEY_PEM)
            .map_err(|e| anyhow::anyhow!("Failed to load fixture signing key: {}", e))?;

        let token_service = Arc::new(TokenService::new(
            users.clone(),
            Arc::new(keys),
            options.revocation,
            TokenSettings {
                issuer: TEST_ISSUER.to_string(),
                access_token_ttl: options.access_token_ttl,
                refresh_token_ttl: options.refresh_token_ttl,
                bcrypt_cost: FIXTURE_BCRYPT_COST,
            },
        )?);

        let state = Arc::new(AppState {
            token_service: token_service.clone(),
        });

        let app = routes::build_routes(state, metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Test auth server failed");
        });

        Ok(Self {
            addr,
            users,
            token_service,
            client: reqwest::Client::new(),
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

    /// URL of the public key endpoint, for gateway configuration.
    pub fn public_key_url(&self) -> String {
        format!("{}/api/v1/auth/public-key", self.url())
    }

    /// User store backing the server, for soft-deleting or adding users.
    pub fn users(&self) -> &InMemoryUserRepository {
        &self.users
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn token_service(&self) -> &TokenService {
        &self.token_service
    }

    /// Log in over HTTP and return the issued pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedTokens, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/api/v1/auth/login", self.url()))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Login failed with status {}", status);
        }

        let body: serde_json::Value = response.json().await?;
        Ok(IssuedTokens {
            access_token: string_field(&body, "access_token")?,
            refresh_token: string_field(&body, "refresh_token")?,
            expires_in: body["expires_in"]
                .as_u64()
                .ok_or_else(|| anyhow::anyhow!("expires_in missing from login response"))?,
        })
    }

    pub async fn login_as_alice(&self) -> Result<IssuedTokens, anyhow::Error> {
        self.login(ALICE_EMAIL, ALICE_PASSWORD).await
    }
}

impl Drop for TestAuthServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

fn fixture_user(
    id: &str,
    email: &str,
    name: &str,
    password: &str,
    is_admin: bool,
) -> Result<User, anyhow::Error> {
    Ok(User {
        user_id: Uuid::parse_str(id)?,
        email: email.to_string(),
        name: name.to_string(),
        password_hash: bcrypt::hash(password, FIXTURE_BCRYPT_COST)?,
        is_admin,
        created_at: chrono::Utc::now(),
        deleted_at: None,
    })
}

fn string_field(body: &serde_json::Value, name: &str) -> Result<String, anyhow::Error> {
    body[name]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("{} missing from response", name))
}

/// The global recorder can only be installed once per test process.
fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| {
            routes::init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}
