//! Mock issuer serving the fixture public key over wiremock.

use auth_test_utils::{FOREIGN_PUBLIC_KEY_PEM, PRIMARY_PUBLIC_KEY_PEM};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PUBLIC_KEY_PATH: &str = "/api/v1/auth/public-key";

/// Stand-in for the auth service's public key endpoint.
///
/// Use this when the test cares about gateway behavior against a misbehaving
/// issuer (down, slow, rotated key). For flows through the real issuer use
/// `auth_test_utils::TestAuthServer`.
pub struct MockIssuer {
    server: MockServer,
}

impl MockIssuer {
    /// Start an issuer serving the primary fixture key.
    pub async fn start() -> Self {
        let issuer = Self {
            server: MockServer::start().await,
        };
        issuer.serve_key(PRIMARY_PUBLIC_KEY_PEM).await;
        issuer
    }

    /// Start an issuer with no endpoints mounted; every request gets 404.
    pub async fn start_empty() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn public_key_url(&self) -> String {
        format!("{}{}", self.server.uri(), PUBLIC_KEY_PATH)
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Replace the served key with the foreign fixture key.
    pub async fn rotate_to_foreign_key(&self) {
        self.server.reset().await;
        self.serve_key(FOREIGN_PUBLIC_KEY_PEM).await;
    }

    /// Serve the primary fixture key again after [`Self::go_down`] or a rotation.
    pub async fn recover(&self) {
        self.server.reset().await;
        self.serve_key(PRIMARY_PUBLIC_KEY_PEM).await;
    }

    /// Make every subsequent fetch fail with 500.
    pub async fn go_down(&self) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(PUBLIC_KEY_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&self.server)
            .await;
    }

    /// Number of public key fetches received since start or the last reset.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|r| r.url.path() == PUBLIC_KEY_PATH)
                    .count()
            })
            .unwrap_or(0)
    }

    async fn serve_key(&self, pem: &str) {
        Mock::given(method("GET"))
            .and(path(PUBLIC_KEY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "public_key": pem,
                "algorithm": "RS256",
                "key_type": "RSA"
            })))
            .mount(&self.server)
            .await;
    }
}
