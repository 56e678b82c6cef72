//! Chat endpoint: one question in, a Server-Sent Events stream out.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::post,
};
use chatpilot_agent::{ChatEvent, ChatRequest};
use futures::StreamExt;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::ratelimit::rate_limit_middleware;
use crate::state::AppState;
use crate::validation::{resolve_files, sanitize_question};

/// Header carrying the session id, in requests and responses.
pub const SESSION_HEADER: &str = "x-session-id";

/// Longest accepted session id.
const MAX_SESSION_ID_LEN: usize = 128;

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatBody {
    pub question: String,

    #[serde(default)]
    pub session_id: Option<String>,

    /// Uploaded file names, relative to the session's upload directory.
    #[serde(default)]
    pub files: Vec<String>,
}

/// Query string of `POST /api/chat`.
#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    session_id: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Chat routes, rate limited when configured.
pub fn chat_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}

/// POST /api/chat
///
/// Validation failures are answered with 400 before any event is sent. After
/// that the response is always a 200 event stream ending in `end` or `error`.
pub async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
    body: std::result::Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response> {
    let Json(body) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let session_id = resolve_session_id(
        body.session_id.as_deref(),
        &headers,
        query.session_id.as_deref(),
    )?;
    let question = sanitize_question(&body.question)?;
    let files = resolve_files(&state.config.upload_dir, &session_id, &body.files)?;

    tracing::info!(session_id = %session_id, files = files.len(), "Chat request accepted");

    let header_value = HeaderValue::from_str(&session_id)
        .map_err(|_| ServerError::BadRequest(format!("Invalid session id: '{session_id}'")))?;

    let request = ChatRequest::new(session_id, question).with_files(files);
    let events = state
        .chat
        .handle_request(request)
        .map(|event| Ok::<_, Infallible>(to_sse_event(&event)));

    Ok((
        [(HeaderName::from_static(SESSION_HEADER), header_value)],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response())
}

/// Body field, then header, then query parameter, then a fresh UUID.
fn resolve_session_id(
    from_body: Option<&str>,
    headers: &HeaderMap,
    from_query: Option<&str>,
) -> Result<String> {
    let from_header = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok());

    let candidate = [from_body, from_header, from_query]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty());

    match candidate {
        Some(id) if id.len() > MAX_SESSION_ID_LEN || id.chars().any(char::is_control) => Err(
            ServerError::BadRequest("Invalid session id".to_string()),
        ),
        Some(id) => Ok(id.to_string()),
        None => Ok(Uuid::new_v4().to_string()),
    }
}

fn to_sse_event(event: &ChatEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event.data())
        .unwrap_or_else(|_| Event::default().event(event.name()))
}
