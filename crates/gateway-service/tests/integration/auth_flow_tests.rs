//! E2E tests through the real issuer.
//!
//! The auth service runs as both the key source and the `auth` backend, so
//! tokens are obtained by logging in through the gateway itself.

use auth_test_utils::*;
use gateway_test_utils::*;
use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Stack {
    // Held so the servers live as long as the test
    _auth: TestAuthServer,
    stats: MockServer,
    gateway: TestGatewayServer,
    client: reqwest::Client,
}

async fn stack() -> Result<Stack, anyhow::Error> {
    let auth = TestAuthServer::spawn().await?;
    let stats = MockServer::start().await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(auth.public_key_url())
            .backend("auth", auth.url())
            .backend("users", auth.url())
            .backend("stats", stats.uri()),
    )
    .await?;

    Ok(Stack {
        _auth: auth,
        stats,
        gateway,
        client: reqwest::Client::new(),
    })
}

impl Stack {
    async fn login(&self, email: &str, password: &str) -> Result<serde_json::Value, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/api/v1/auth/login", self.gateway.url()))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(response.json().await?)
    }

    async fn get_stats(&self, authorization: Option<&str>) -> Result<reqwest::Response, anyhow::Error> {
        let mut request = self
            .client
            .get(format!("{}/api/v1/stats/cpu", self.gateway.url()));
        if let Some(value) = authorization {
            request = request.header("authorization", value);
        }
        Ok(request.send().await?)
    }
}

#[tokio::test]
async fn test_login_through_gateway_then_access_protected_backend() -> Result<(), anyhow::Error> {
    let stack = stack().await?;
    Mock::given(method("GET"))
        .and(path("/api/v1/stats/cpu"))
        .and(header("x-user-id", ALICE_ID))
        .and(header("x-user-email", ALICE_EMAIL))
        .and(header("x-user-is-admin", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cpu": 42 })))
        .expect(1)
        .mount(&stack.stats)
        .await;

    let tokens = stack.login(ALICE_EMAIL, ALICE_PASSWORD).await?;
    let access = tokens["access_token"].as_str().unwrap();

    let response = stack
        .get_stats(Some(&format!("Bearer {}", access)))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["cpu"], 42);
    Ok(())
}

#[tokio::test]
async fn test_admin_flag_injected_for_admin_user() -> Result<(), anyhow::Error> {
    let stack = stack().await?;
    Mock::given(method("GET"))
        .and(header("x-user-id", ADMIN_ID))
        .and(header("x-user-is-admin", "true"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&stack.stats)
        .await;

    let tokens = stack.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    let access = tokens["access_token"].as_str().unwrap();

    let response = stack
        .get_stats(Some(&format!("Bearer {}", access)))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_missing_token_rejected_without_contacting_backend() -> Result<(), anyhow::Error> {
    let stack = stack().await?;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&stack.stats)
        .await;

    let response = stack.get_stats(None).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("www-authenticate").unwrap(),
        "Bearer realm=\"home-server\""
    );
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"], "Authorization header required");
    Ok(())
}

#[tokio::test]
async fn test_malformed_authorization_header_rejected() -> Result<(), anyhow::Error> {
    let stack = stack().await?;

    let response = stack.get_stats(Some("Basic YWxpY2U6cHc=")).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["code"], "INVALID_AUTHORIZATION_HEADER");
    Ok(())
}

#[tokio::test]
async fn test_refresh_token_rejected_as_bearer() -> Result<(), anyhow::Error> {
    let stack = stack().await?;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&stack.stats)
        .await;

    let tokens = stack.login(ALICE_EMAIL, ALICE_PASSWORD).await?;
    let refresh = tokens["refresh_token"].as_str().unwrap();

    let response = stack
        .get_stats(Some(&format!("Bearer {}", refresh)))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["code"], "INVALID_TOKEN");
    Ok(())
}

#[tokio::test]
async fn test_expired_token_rejected() -> Result<(), anyhow::Error> {
    let stack = stack().await?;
    let expired = TestTokenBuilder::access().expired_seconds_ago(10).sign();

    let response = stack
        .get_stats(Some(&format!("Bearer {}", expired)))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_foreign_signed_token_rejected() -> Result<(), anyhow::Error> {
    let stack = stack().await?;
    let forged = TestTokenBuilder::access()
        .admin(true)
        .signed_by_foreign_key()
        .sign();

    let response = stack
        .get_stats(Some(&format!("Bearer {}", forged)))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_unsigned_token_rejected() -> Result<(), anyhow::Error> {
    let stack = stack().await?;
    let unsigned = TestTokenBuilder::access().unsigned();

    let response = stack
        .get_stats(Some(&format!("Bearer {}", unsigned)))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_refresh_through_gateway_is_public() -> Result<(), anyhow::Error> {
    let stack = stack().await?;
    let tokens = stack.login(ALICE_EMAIL, ALICE_PASSWORD).await?;

    let response = stack
        .client
        .post(format!("{}/api/v1/auth/refresh", stack.gateway.url()))
        .json(&json!({ "refresh_token": tokens["refresh_token"] }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert!(body["access_token"].as_str().is_some());
    assert_eq!(body["token_type"], "Bearer");
    Ok(())
}

#[tokio::test]
async fn test_logout_through_gateway_requires_token() -> Result<(), anyhow::Error> {
    let stack = stack().await?;

    let response = stack
        .client
        .post(format!("{}/api/v1/auth/logout", stack.gateway.url()))
        .json(&json!({ "refresh_token": "whatever" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_logout_through_gateway_with_token_is_forwarded() -> Result<(), anyhow::Error> {
    let stack = stack().await?;
    let tokens = stack.login(ALICE_EMAIL, ALICE_PASSWORD).await?;

    let response = stack
        .client
        .post(format!("{}/api/v1/auth/logout", stack.gateway.url()))
        .bearer_auth(tokens["access_token"].as_str().unwrap())
        .json(&json!({ "refresh_token": tokens["refresh_token"] }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["revoked"], false);
    Ok(())
}

#[tokio::test]
async fn test_failed_login_relayed_from_issuer() -> Result<(), anyhow::Error> {
    let stack = stack().await?;

    let response = stack
        .client
        .post(format!("{}/api/v1/auth/login", stack.gateway.url()))
        .json(&json!({ "email": ALICE_EMAIL, "password": "wrong-password" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
    Ok(())
}

#[tokio::test]
async fn test_profile_update_through_gateway_succeeds() -> Result<(), anyhow::Error> {
    let stack = stack().await?;
    let tokens = stack.login(ALICE_EMAIL, ALICE_PASSWORD).await?;
    let access = tokens["access_token"].as_str().unwrap();

    let response = stack
        .client
        .put(format!("{}/api/v1/users/profile", stack.gateway.url()))
        .bearer_auth(access)
        .json(&json!({ "name": "Alice Liddell" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["id"], ALICE_ID);
    assert_eq!(body["name"], "Alice Liddell");
    Ok(())
}

#[tokio::test]
async fn test_profile_update_without_token_rejected_at_gateway() -> Result<(), anyhow::Error> {
    let stack = stack().await?;

    let response = stack
        .client
        .put(format!("{}/api/v1/users/profile", stack.gateway.url()))
        .json(&json!({ "name": "Mallory" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["code"], "MISSING_CREDENTIALS");
    Ok(())
}
