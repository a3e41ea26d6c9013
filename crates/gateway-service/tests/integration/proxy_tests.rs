//! E2E tests for forwarding behavior.

use auth_test_utils::*;
use gateway_service::services::ProxySettings;
use gateway_test_utils::*;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bearer() -> String {
    format!("Bearer {}", TestTokenBuilder::access().sign())
}

/// A local port with nothing listening on it.
fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// Send a GET with the request target written verbatim, since reqwest
/// resolves dot segments before sending.
async fn raw_get(gateway: &TestGatewayServer, target: &str) -> Result<String, anyhow::Error> {
    let mut stream = tokio::net::TcpStream::connect(gateway.addr()).await?;
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        target,
        gateway.addr()
    );
    stream.write_all(request.as_bytes()).await?;
    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response)
}

#[tokio::test]
async fn test_proxy_relays_status_headers_and_body() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let backend = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/camera/presets/3"))
        .and(query_param("apply", "now"))
        .and(body_json(json!({ "zoom": 2 })))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("x-camera-job", "job-17")
                .set_body_json(json!({ "queued": true })),
        )
        .expect(1)
        .mount(&backend)
        .await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url()).backend("camera", backend.uri()),
    )
    .await?;

    let response = reqwest::Client::new()
        .put(format!(
            "{}/api/v1/camera/presets/3?apply=now",
            gateway.url()
        ))
        .header("authorization", bearer())
        .json(&json!({ "zoom": 2 }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers().get("x-camera-job").unwrap(), "job-17");
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["queued"], true);
    Ok(())
}

#[tokio::test]
async fn test_proxy_replaces_spoofed_identity_headers() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("x-user-id", ALICE_ID))
        .and(header("x-user-is-admin", "false"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&backend)
        .await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url()).backend("stats", backend.uri()),
    )
    .await?;

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/stats/cpu", gateway.url()))
        .header("authorization", bearer())
        .header("x-user-id", ADMIN_ID)
        .header("x-user-is-admin", "true")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_proxy_backend_error_status_relayed() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
        .expect(1)
        .mount(&backend)
        .await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url()).backend("stats", backend.uri()),
    )
    .await?;

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/stats/disk", gateway.url()))
        .header("authorization", bearer())
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await?, "disk full");
    Ok(())
}

#[tokio::test]
async fn test_proxy_unknown_service_returns_404() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url()).backend("stats", closed_port_url()),
    )
    .await?;

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/printer/queue", gateway.url()))
        .header("authorization", bearer())
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["code"], "UNKNOWN_SERVICE");
    Ok(())
}

#[tokio::test]
async fn test_proxy_unreachable_backend_returns_502() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url())
            .backend("stats", closed_port_url())
            .proxy(ProxySettings {
                timeout: Duration::from_secs(1),
                max_retries: 2,
                retry_delay: Duration::from_millis(10),
                max_request_body_bytes: 1024,
            }),
    )
    .await?;

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/stats/cpu", gateway.url()))
        .header("authorization", bearer())
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"], "Service stats is unavailable");
    Ok(())
}

#[tokio::test]
async fn test_proxy_slow_backend_times_out_with_502() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&backend)
        .await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url())
            .backend("stats", backend.uri())
            .proxy(ProxySettings {
                timeout: Duration::from_millis(200),
                max_retries: 1,
                retry_delay: Duration::from_millis(10),
                max_request_body_bytes: 1024,
            }),
    )
    .await?;

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/stats/cpu", gateway.url()))
        .header("authorization", bearer())
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(backend.received_requests().await.unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_proxy_oversized_body_returns_413() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url())
            .backend("stats", backend.uri())
            .proxy(ProxySettings {
                timeout: Duration::from_secs(1),
                max_retries: 0,
                retry_delay: Duration::from_millis(10),
                max_request_body_bytes: 64,
            }),
    )
    .await?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/stats/upload", gateway.url()))
        .header("authorization", bearer())
        .body("x".repeat(1024))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[tokio::test]
async fn test_proxy_dot_segments_under_public_prefix_return_400() -> Result<(), anyhow::Error> {
    // Issuer unreachable: an anonymous request must not depend on it
    let issuer = MockIssuer::start_empty().await;
    issuer.go_down().await;
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("admin data"))
        .expect(0)
        .mount(&backend)
        .await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url())
            .backend("stats", backend.uri())
            .public_path("/api/v1/stats/public"),
    )
    .await?;

    for target in [
        "/api/v1/stats/public/../admin",
        "/api/v1/stats/public/%2e%2e/admin",
        "/api/v1/stats/public/%2E./admin",
    ] {
        let response = raw_get(&gateway, target).await?;
        assert!(
            response.starts_with("HTTP/1.1 400"),
            "{target}: {response}"
        );
        assert!(response.contains("INVALID_PATH"));
        assert!(!response.contains("admin data"));
    }
    Ok(())
}

#[tokio::test]
async fn test_proxy_public_prefix_still_served_anonymously() -> Result<(), anyhow::Error> {
    let issuer = MockIssuer::start().await;
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/stats/public/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_string("summary"))
        .expect(1)
        .mount(&backend)
        .await;
    let gateway = TestGatewayServer::spawn(
        TestGatewayOptions::new(issuer.public_key_url())
            .backend("stats", backend.uri())
            .public_path("/api/v1/stats/public"),
    )
    .await?;

    let response = reqwest::get(format!("{}/api/v1/stats/public/summary", gateway.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "summary");
    Ok(())
}
