//! E2E tests for unauthenticated operational endpoints.

use gateway_test_utils::*;
use reqwest::StatusCode;

#[tokio::test]
async fn test_health_needs_no_token_and_no_issuer() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start_empty().await;
    let gateway = TestGatewayServer::spawn(TestGatewayOptions::new(issuer.public_key_url())).await?;

    let response = reqwest::get(format!("{}/health", gateway.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "gateway");
    assert!(body["timestamp"].as_i64().is_some());
    assert_eq!(issuer.fetch_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_exposed() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start_empty().await;
    let gateway = TestGatewayServer::spawn(TestGatewayOptions::new(issuer.public_key_url())).await?;

    let response = reqwest::get(format!("{}/metrics", gateway.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_unrouted_path_is_404() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start_empty().await;
    let gateway = TestGatewayServer::spawn(TestGatewayOptions::new(issuer.public_key_url())).await?;

    let response = reqwest::get(format!("{}/admin", gateway.url())).await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_cors_preflight_for_listed_origin_succeeds() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start_empty().await;
    let mut options = TestGatewayOptions::new(issuer.public_key_url());
    options.cors_allowed_origins = vec!["https://home.local".parse()?];
    let gateway = TestGatewayServer::spawn(options).await?;

    let response = reqwest::Client::new()
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/api/v1/stats/cpu", gateway.url()),
        )
        .header("origin", "https://home.local")
        .header("access-control-request-method", "GET")
        .send()
        .await?;

    assert!(response.status().is_success());
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "https://home.local"
    );
    assert_eq!(issuer.fetch_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_health_carries_security_headers() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start_empty().await;
    let gateway = TestGatewayServer::spawn(TestGatewayOptions::new(issuer.public_key_url())).await?;

    let response = reqwest::get(format!("{}/health", gateway.url())).await?;

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("referrer-policy").unwrap(), "strict-origin-when-cross-origin");
    Ok(())
}
