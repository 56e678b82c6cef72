//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use chatpilot_agent::{ChatOrchestrator, CodeExecutor, FileAnalyzer, FileMetadataMap};
use chatpilot_llm::MockBackend;
use chatpilot_sandbox::ExecutionOutcome;
use chatpilot_server::{AppState, Server, ServerConfig};
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;

/// Executor for tests that never reach the sandbox.
pub struct NoSandbox;

#[async_trait]
impl CodeExecutor for NoSandbox {
    async fn execute(&self, _code: &str) -> chatpilot_agent::Result<ExecutionOutcome> {
        Ok(ExecutionOutcome::error("sandbox disabled in tests"))
    }
}

/// Records the paths it is asked to analyze.
#[derive(Default)]
pub struct RecordingFiles {
    pub seen: Mutex<Vec<String>>,
}

#[async_trait]
impl FileAnalyzer for RecordingFiles {
    async fn analyze(&self, paths: &[String]) -> chatpilot_agent::Result<FileMetadataMap> {
        self.seen.lock().extend(paths.iter().cloned());
        Ok(FileMetadataMap::new())
    }
}

/// A router over a scripted backend.
pub struct TestApp {
    pub router: Router,
    pub backend: Arc<MockBackend>,
    pub files: Arc<RecordingFiles>,
}

impl TestApp {
    pub fn new(backend: MockBackend) -> Self {
        Self::with_config(backend, ServerConfig::new().with_rate_limiting(false))
    }

    pub fn with_config(backend: MockBackend, config: ServerConfig) -> Self {
        let backend = Arc::new(backend);
        let files = Arc::new(RecordingFiles::default());
        let chat = ChatOrchestrator::builder()
            .with_backend(backend.clone())
            .with_file_analyzer(files.clone())
            .with_code_executor(Arc::new(NoSandbox))
            .build()
            .expect("test orchestrator");
        let router = Server::new(AppState::new(Arc::new(chat), config)).router();
        Self {
            router,
            backend,
            files,
        }
    }

    /// POST a JSON body to `/api/chat`.
    pub async fn post_chat(&self, body: Value) -> Result<Response<Body>> {
        self.post_chat_with("/api/chat", &[], body).await
    }

    /// POST a JSON body to `uri` with extra headers.
    pub async fn post_chat_with(
        &self,
        uri: &str,
        headers: &[(&str, &str)],
        body: Value,
    ) -> Result<Response<Body>> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(serde_json::to_vec(&body)?))?;
        Ok(self.router.clone().oneshot(request).await?)
    }

    pub async fn post_raw(&self, body: &'static str) -> Result<Response<Body>> {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))?;
        Ok(self.router.clone().oneshot(request).await?)
    }

    pub async fn get(&self, uri: &str) -> Result<Response<Body>> {
        let request = Request::builder().uri(uri).body(Body::empty())?;
        Ok(self.router.clone().oneshot(request).await?)
    }
}

/// Read a whole body.
pub async fn body_bytes(response: Response<Body>) -> Result<Vec<u8>> {
    Ok(axum::body::to_bytes(response.into_body(), usize::MAX)
        .await?
        .to_vec())
}

/// Read a JSON body.
pub async fn body_json(response: Response<Body>) -> Result<Value> {
    Ok(serde_json::from_slice(&body_bytes(response).await?)?)
}

/// Parse an SSE body into `(event name, JSON data)` pairs.
pub async fn sse_events(response: Response<Body>) -> Result<Vec<(String, Value)>> {
    let text = String::from_utf8(body_bytes(response).await?)?;
    let mut events = Vec::new();
    for block in text.split("\n\n") {
        let mut name = None;
        let mut data = None;
        for line in block.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                name = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                data = Some(serde_json::from_str(rest.trim())?);
            }
        }
        if let (Some(name), Some(data)) = (name, data) {
            events.push((name, data));
        }
    }
    Ok(events)
}
