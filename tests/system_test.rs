//! End-to-end wiring: config, pipeline and router, with Gemini mocked.

use std::path::Path;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use secrecy::Secret;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use photo_advisor_core::config::{AppConfig, DeploymentVars, FailurePolicy};
use photo_advisor_gateway::{AnalysisPipeline, GatewayConfig, GatewayServer};

const BOUNDARY: &str = "system-test-boundary";
const GEMINI_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

fn app_config(upload_dir: &Path, gemini: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.upload.dir = upload_dir.to_path_buf();
    config.inference.api_key = Some(Secret::new("system-key".to_string()));
    config.inference.base_url = gemini.uri();
    config.inference.timeout_secs = 5;
    config.governance.environment = "test".into();
    config
}

fn analyze_request() -> Request<Body> {
    let mut body = Vec::new();
    for (name, file_name, data) in [
        ("image", "leaf.jpg", &b"problem-bytes"[..]),
        ("selfie", "me.jpg", &b"selfie-bytes"[..]),
    ] {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/jpeg\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in [("consent", "true"), ("prompt", "What is wrong with this leaf?")] {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(config: &AppConfig) -> (StatusCode, Value) {
    let pipeline = AnalysisPipeline::from_config(config);
    let app = GatewayServer::new(GatewayConfig::from_config(config), pipeline).build_router();
    let response = app.oneshot(analyze_request()).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn files_left(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_full_request_against_mocked_gemini() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(header("x-goog-api-key", "system-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "1. What is the problem: leaf rust."}]},
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&gemini)
        .await;

    let uploads = tempfile::tempdir().unwrap();
    let config = app_config(uploads.path(), &gemini);

    let (status, json) = send(&config).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["response"], "1. What is the problem: leaf rust.");
    assert_eq!(files_left(uploads.path()), 0);
}

#[tokio::test]
async fn test_gemini_outage_under_both_policies() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&gemini)
        .await;

    let uploads = tempfile::tempdir().unwrap();
    let mut config = app_config(uploads.path(), &gemini);

    let (status, json) = send(&config).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(files_left(uploads.path()), 0);

    config.inference.failure_policy = FailurePolicy::Degrade;
    let (status, json) = send(&config).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["response"], config.inference.placeholder_response.as_str());
    assert_eq!(files_left(uploads.path()), 0);
}

#[tokio::test]
async fn test_missing_api_key_is_500_even_when_degrading() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&gemini)
        .await;

    let uploads = tempfile::tempdir().unwrap();
    let mut config = app_config(uploads.path(), &gemini);
    config.inference.api_key = None;
    config.inference.failure_policy = FailurePolicy::Degrade;

    let (status, json) = send(&config).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(files_left(uploads.path()), 0);
}

#[test]
fn test_deployment_variables_override_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("production.toml"),
        "[server]\nport = 8080\n\n[inference]\nfailure_policy = \"degrade\"\n",
    )
    .unwrap();

    let vars = DeploymentVars {
        port: Some("9090".into()),
        gemini_api_key: Some("from-env".into()),
        ..Default::default()
    };
    let config = AppConfig::load_from(dir.path(), "production", &vars).unwrap();

    assert_eq!(config.server.port, 9090);
    assert_eq!(config.inference.failure_policy, FailurePolicy::Degrade);
    assert_eq!(config.governance.environment, "production");
    assert!(config.inference.api_key.is_some());
    config.validate().unwrap();
}
