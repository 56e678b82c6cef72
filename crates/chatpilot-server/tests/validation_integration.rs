//! Requests rejected before any event is streamed.

mod common;

use anyhow::Result;
use axum::http::{StatusCode, header};
use chatpilot_llm::MockBackend;
use chatpilot_server::ServerConfig;
use common::{TestApp, body_json};
use serde_json::json;

async fn assert_bad_request(app: &TestApp, body: serde_json::Value, needle: &str) -> Result<()> {
    let response = app.post_chat(body).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await?;
    assert_eq!(error["code"], "bad_request");
    let message = error["message"].as_str().unwrap_or_default();
    assert!(message.contains(needle), "{message:?} should mention {needle:?}");
    Ok(())
}

#[tokio::test]
async fn test_rejects_empty_question() -> Result<()> {
    let app = TestApp::new(MockBackend::new());
    assert_bad_request(&app, json!({ "question": "   " }), "empty").await?;
    assert_bad_request(&app, json!({ "question": "<br>" }), "empty").await?;
    assert_eq!(app.backend.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_rejects_long_question() -> Result<()> {
    let app = TestApp::new(MockBackend::new());
    assert_bad_request(&app, json!({ "question": "x".repeat(1001) }), "1000").await
}

#[tokio::test]
async fn test_rejects_too_many_files() -> Result<()> {
    let app = TestApp::new(MockBackend::new());
    assert_bad_request(
        &app,
        json!({ "question": "q", "files": ["a.csv", "b.csv", "c.csv", "d.csv"] }),
        "Maximum 3 files",
    )
    .await
}

#[tokio::test]
async fn test_rejects_unsupported_file_type() -> Result<()> {
    let app = TestApp::new(MockBackend::new());
    assert_bad_request(
        &app,
        json!({ "question": "q", "files": ["report.pdf"] }),
        "not supported",
    )
    .await
}

#[tokio::test]
async fn test_rejects_path_traversal() -> Result<()> {
    let app = TestApp::new(MockBackend::new());
    assert_bad_request(
        &app,
        json!({ "question": "q", "files": ["../../etc/passwd.csv"] }),
        "Invalid file name",
    )
    .await?;
    assert!(app.files.seen.lock().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_rejects_missing_question_and_bad_json() -> Result<()> {
    let app = TestApp::new(MockBackend::new());

    let response = app.post_chat(json!({ "files": [] })).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["code"], "bad_request");

    let response = app.post_raw("{not json").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["code"], "bad_request");
    Ok(())
}

#[tokio::test]
async fn test_rate_limit_returns_429() -> Result<()> {
    let app = TestApp::with_config(
        MockBackend::new().with_text_turn("ok"),
        ServerConfig::new().with_chat_rpm(1),
    );

    let first = app.post_chat(json!({ "question": "one" })).await?;
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.post_chat(json!({ "question": "two" })).await?;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = second.headers()[header::RETRY_AFTER].to_str()?.parse()?;
    assert!(retry_after >= 1);
    assert_eq!(body_json(second).await?["code"], "rate_limit_exceeded");

    // Health is never limited.
    assert_eq!(app.get("/health").await?.status(), StatusCode::OK);
    Ok(())
}
