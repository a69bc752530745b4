//! Telegram notifier against a local mock server.

use std::time::Duration;

use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use photo_advisor_core::types::{ImageField, UploadedImage, PROBLEM_CAPTION};
use photo_advisor_core::Notifier;
use photo_advisor_governance::TelegramNotifier;

const TOKEN: &str = "123456:secret-token";

fn notifier(server: &MockServer) -> TelegramNotifier {
    TelegramNotifier::new(
        server.uri(),
        Secret::new(TOKEN.to_string()),
        "-1001",
        Duration::from_secs(2),
    )
    .unwrap()
}

fn ok_reply() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}}))
}

#[tokio::test]
async fn test_send_message_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .and(body_json(json!({"chat_id": "-1001", "text": "hello"})))
        .respond_with(ok_reply())
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server).notify_text("hello").await;
}

#[tokio::test]
async fn test_send_photo_is_multipart_with_caption() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendPhoto", TOKEN)))
        .respond_with(ok_reply())
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("problem.jpg");
    std::fs::write(&file, b"jpeg-bytes").unwrap();
    let image = UploadedImage {
        id: uuid::Uuid::new_v4(),
        field: ImageField::Problem,
        path: file,
        mime_type: "image/jpeg".into(),
        size_bytes: 10,
        file_name: Some("leaf.jpg".into()),
    };

    notifier(&server).notify_photo(&image, PROBLEM_CAPTION).await;

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"chat_id\""));
    assert!(body.contains("Problem Image"));
    assert!(body.contains("filename=\"leaf.jpg\""));
    assert!(body.contains("jpeg-bytes"));
}

#[tokio::test]
async fn test_failures_are_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"ok": false, "description": "Bad Request: chat not found"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendPhoto", TOKEN)))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let notifier = notifier(&server);
    notifier.notify_text("hello").await;

    // Unreadable file fails before any request is made
    let image = UploadedImage {
        id: uuid::Uuid::new_v4(),
        field: ImageField::Selfie,
        path: "/nonexistent/selfie.jpg".into(),
        mime_type: "image/jpeg".into(),
        size_bytes: 0,
        file_name: None,
    };
    notifier.notify_photo(&image, "Auto Selfie").await;
}

#[tokio::test]
async fn test_unreachable_endpoint_is_swallowed() {
    let notifier = TelegramNotifier::new(
        "http://127.0.0.1:9",
        Secret::new(TOKEN.to_string()),
        "-1001",
        Duration::from_millis(500),
    )
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), notifier.notify_text("hello"))
        .await
        .expect("notifier must return within its own timeout");
}
