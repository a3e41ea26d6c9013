//! E2E tests for the refresh endpoint.

use auth_test_utils::*;
use common::jwt::{verify_token, TokenKind};
use reqwest::StatusCode;
use serde_json::json;

async fn post_refresh(
    server: &TestAuthServer,
    refresh_token: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(format!("{}/api/v1/auth/refresh", server.url()))
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await?)
}

#[tokio::test]
async fn test_refresh_valid_token_returns_new_pair() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let tokens = server.login_as_alice().await?;

    let response = post_refresh(&server, &tokens.refresh_token).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    let access = body["access_token"].as_str().unwrap_or_default();
    let claims = verify_token(access, &primary_decoding_key())?;
    assert_eq!(claims.kind, TokenKind::Access);
    assert_eq!(claims.sub, ALICE_ID);
    assert_eq!(claims.email, ALICE_EMAIL);
    assert_eq!(body["expires_in"].as_u64(), Some(1800));

    Ok(())
}

#[tokio::test]
async fn test_refresh_with_access_token_returns_401() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let tokens = server.login_as_alice().await?;

    let response = post_refresh(&server, &tokens.access_token).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["code"], "INVALID_TOKEN_TYPE");

    Ok(())
}

#[tokio::test]
async fn test_refresh_expired_token_returns_401() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let expired = TestTokenBuilder::refresh().expired_seconds_ago(10).sign();

    let response = post_refresh(&server, &expired).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["code"], "INVALID_TOKEN");

    Ok(())
}

#[tokio::test]
async fn test_refresh_foreign_key_token_returns_401() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let forged = TestTokenBuilder::refresh().signed_by_foreign_key().sign();

    let response = post_refresh(&server, &forged).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_refresh_garbage_token_returns_401() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = post_refresh(&server, "not.a.jwt").await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_refresh_does_not_require_live_user() -> Result<(), anyhow::Error> {
    // Identity comes from the refresh token itself
    let server = TestAuthServer::spawn().await?;
    let tokens = server.login_as_alice().await?;
    server.users().soft_delete(ALICE_EMAIL);

    let response = post_refresh(&server, &tokens.refresh_token).await?;

    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}
