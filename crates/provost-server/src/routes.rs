//! HTTP route handlers.
//!
//! The chat endpoint answers with a chunked stream of newline-delimited
//! JSON event objects; the connection closing is the only end-of-stream
//! marker. Setup failures (busy session, unknown persona) are rejected
//! with plain HTTP statuses before the stream opens.

use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::instrument;

use provost_core::messages::{Message, StoredMessage};
use provost_runtime::{ChatRequest, Persona};
use provost_store::SessionRow;

use crate::AppState;
use crate::error::ApiError;

/// Events buffered between the loop and a slow client before emits await.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Inbound chat request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    /// The user's prompt.
    pub prompt: String,
    /// Existing session to continue.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Client-held history; seeds a new session only.
    #[serde(default)]
    pub prior_messages: Vec<Message>,
    /// Ask for fire-and-forget title generation.
    #[serde(default)]
    pub title_requested: bool,
}

/// `POST /api/chat/{persona}` — run the loop, streaming NDJSON events.
#[instrument(skip_all, fields(persona = %persona))]
pub async fn chat(
    State(state): State<AppState>,
    Path(persona): Path<String>,
    Json(body): Json<ChatBody>,
) -> Result<Response, ApiError> {
    counter!("http_requests_total", "route" => "chat").increment(1);
    let persona = Persona::parse(&persona)?;
    let request = ChatRequest {
        persona,
        prompt: body.prompt,
        session_id: body.session_id,
        prior_messages: body.prior_messages,
        title_requested: body.title_requested,
    };

    // Claim the run slot first: busy/capacity errors become plain HTTP
    // statuses instead of a stream that dies after one line.
    let prepared = state.orchestrator.prepare(request)?;
    let session_id = prepared.session_id.clone();

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let orchestrator = state.orchestrator.clone();
    let _run = tokio::spawn(async move {
        orchestrator.execute(prepared, tx).await;
    });

    // One JSON object per line. Dropping this body (client disconnect)
    // drops the receiver, which cancels the run.
    let stream = ReceiverStream::new(rx).map(|event| {
        let mut line = serde_json::to_vec(&event).unwrap_or_else(|_| b"{}".to_vec());
        line.push(b'\n');
        Ok::<_, Infallible>(Bytes::from(line))
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header("x-provost-session", session_id)
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    Ok(response)
}

/// Session list entry / detail payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    #[serde(flatten)]
    session: SessionRow,
}

/// `GET /api/sessions/{id}/messages` — the persisted history.
#[instrument(skip_all, fields(session_id = %session_id))]
pub async fn session_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<StoredMessage>>, ApiError> {
    counter!("http_requests_total", "route" => "session_messages").increment(1);
    let history = state.orchestrator.store().load_history(&session_id)?;
    Ok(Json(history))
}

/// `GET /api/sessions` — sessions, optionally filtered by category.
#[instrument(skip_all)]
pub async fn list_sessions(
    State(state): State<AppState>,
    axum::extract::Query(filter): axum::extract::Query<CategoryFilter>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    counter!("http_requests_total", "route" => "list_sessions").increment(1);
    let filter = filter.category.as_deref();
    let sessions = state.orchestrator.store().list_sessions(filter)?;
    Ok(Json(
        sessions
            .into_iter()
            .map(|session| SessionSummary { session })
            .collect(),
    ))
}

/// Query filter for [`list_sessions`].
#[derive(Debug, Deserialize)]
pub struct CategoryFilter {
    /// Category tag to filter on.
    pub category: Option<String>,
}

/// `GET /health` — liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// `GET /metrics` — Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}
