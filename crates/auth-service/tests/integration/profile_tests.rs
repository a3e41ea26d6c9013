//! E2E tests for the user profile endpoints.
//!
//! ## Test Naming
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use auth_test_utils::*;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_profile_update_then_read_returns_new_values() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let tokens = server.login_as_alice().await?;
    let url = format!("{}/api/v1/users/profile", server.url());

    // Act
    let response = server
        .client()
        .put(&url)
        .bearer_auth(&tokens.access_token)
        .json(&json!({ "name": "Alice Liddell" }))
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["name"], "Alice Liddell");
    assert_eq!(body["email"], ALICE_EMAIL);

    let profile: serde_json::Value = server
        .client()
        .get(&url)
        .bearer_auth(&tokens.access_token)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(profile["id"], ALICE_ID);
    assert_eq!(profile["name"], "Alice Liddell");

    Ok(())
}

#[tokio::test]
async fn test_profile_email_taken_by_other_user_returns_409() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let tokens = server.login_as_alice().await?;

    let response = server
        .client()
        .put(format!("{}/api/v1/users/profile", server.url()))
        .bearer_auth(&tokens.access_token)
        .json(&json!({ "email": ADMIN_EMAIL }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["code"], "CONFLICT");

    // Both accounts still log in with their original emails
    server.login_as_alice().await?;
    server.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;

    Ok(())
}

#[tokio::test]
async fn test_profile_with_refresh_token_returns_401() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let tokens = server.login_as_alice().await?;

    let response = server
        .client()
        .put(format!("{}/api/v1/users/profile", server.url()))
        .bearer_auth(&tokens.refresh_token)
        .json(&json!({ "name": "Mallory" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_profile_malformed_body_returns_json_400() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let tokens = server.login_as_alice().await?;

    let response = server
        .client()
        .put(format!("{}/api/v1/users/profile", server.url()))
        .bearer_auth(&tokens.access_token)
        .header("content-type", "application/json")
        .body("{\"name\":")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["code"], "BAD_REQUEST");

    Ok(())
}
