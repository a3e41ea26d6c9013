//! E2E tests for public-key caching against a mock issuer.

use auth_test_utils::*;
use gateway_service::auth::FAILED_FETCH_BACKOFF;
use gateway_test_utils::*;
use reqwest::StatusCode;
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn ok_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

async fn get_with_token(
    gateway: &TestGatewayServer,
    token: &str,
) -> Result<StatusCode, anyhow::Error> {
    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/stats/cpu", gateway.url()))
        .bearer_auth(token)
        .send()
        .await?;
    Ok(response.status())
}

#[tokio::test]
async fn test_key_fetched_lazily_on_first_authenticated_request() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let backend = ok_backend().await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url()).backend("stats", backend.uri()),
    )
    .await?;

    assert_eq!(issuer.fetch_count().await, 0);
    assert!(!gateway.key_cache().is_warm().await);

    let token = TestTokenBuilder::access().sign();
    assert_eq!(get_with_token(&gateway, &token).await?, StatusCode::OK);

    assert_eq!(issuer.fetch_count().await, 1);
    assert!(gateway.key_cache().is_warm().await);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_cold_requests_fetch_key_once() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let backend = ok_backend().await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url()).backend("stats", backend.uri()),
    )
    .await?;
    let token = TestTokenBuilder::access().sign();
    let url = format!("{}/api/v1/stats/cpu", gateway.url());
    let client = reqwest::Client::new();

    let requests = (0..50).map(|_| {
        let client = client.clone();
        let url = url.clone();
        let token = token.clone();
        tokio::spawn(async move { client.get(url).bearer_auth(token).send().await })
    });

    for handle in futures::future::join_all(requests).await {
        let response = handle??;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(issuer.fetch_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_warm_cache_survives_issuer_outage() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let backend = ok_backend().await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url()).backend("stats", backend.uri()),
    )
    .await?;
    let token = TestTokenBuilder::access().sign();

    assert_eq!(get_with_token(&gateway, &token).await?, StatusCode::OK);
    issuer.go_down().await;

    assert_eq!(get_with_token(&gateway, &token).await?, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_issuer_down_on_cold_cache_returns_503() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    issuer.go_down().await;
    let backend = ok_backend().await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url()).backend("stats", backend.uri()),
    )
    .await?;
    let token = TestTokenBuilder::access().sign();

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/stats/cpu", gateway.url()))
        .bearer_auth(&token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["code"], "AUTH_UNAVAILABLE");
    assert!(!gateway.key_cache().is_warm().await);
    Ok(())
}

#[tokio::test]
async fn test_expired_key_with_issuer_down_fails_closed() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let backend = ok_backend().await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url())
            .backend("stats", backend.uri())
            .key_cache_ttl(Duration::from_millis(200)),
    )
    .await?;
    let token = TestTokenBuilder::access().sign();

    assert_eq!(get_with_token(&gateway, &token).await?, StatusCode::OK);
    issuer.go_down().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        get_with_token(&gateway, &token).await?,
        StatusCode::SERVICE_UNAVAILABLE
    );
    Ok(())
}

#[tokio::test]
async fn test_expired_key_within_stale_grace_still_validates() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let backend = ok_backend().await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url())
            .backend("stats", backend.uri())
            .key_cache_ttl(Duration::from_millis(200))
            .stale_grace(Duration::from_secs(60)),
    )
    .await?;
    let token = TestTokenBuilder::access().sign();

    assert_eq!(get_with_token(&gateway, &token).await?, StatusCode::OK);
    issuer.go_down().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(get_with_token(&gateway, &token).await?, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_recovers_after_issuer_comes_back() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    issuer.go_down().await;
    let backend = ok_backend().await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url()).backend("stats", backend.uri()),
    )
    .await?;
    let token = TestTokenBuilder::access().sign();

    assert_eq!(
        get_with_token(&gateway, &token).await?,
        StatusCode::SERVICE_UNAVAILABLE
    );

    issuer.recover().await;
    // The failure is replayed until the backoff window has passed
    tokio::time::sleep(FAILED_FETCH_BACKOFF + Duration::from_millis(100)).await;

    assert_eq!(get_with_token(&gateway, &token).await?, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_rotated_key_picked_up_after_invalidate() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let backend = ok_backend().await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url()).backend("stats", backend.uri()),
    )
    .await?;
    let old_token = TestTokenBuilder::access().sign();
    let new_token = TestTokenBuilder::access().signed_by_foreign_key().sign();

    assert_eq!(get_with_token(&gateway, &old_token).await?, StatusCode::OK);

    issuer.rotate_to_foreign_key().await;
    // Cached key still in force until it expires or is invalidated
    assert_eq!(get_with_token(&gateway, &old_token).await?, StatusCode::OK);
    assert_eq!(
        get_with_token(&gateway, &new_token).await?,
        StatusCode::UNAUTHORIZED
    );

    gateway.key_cache().invalidate().await;

    assert_eq!(
        get_with_token(&gateway, &old_token).await?,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(get_with_token(&gateway, &new_token).await?, StatusCode::OK);
    Ok(())
}
