//! # provost-server
//!
//! Axum HTTP surface for the Provost agent:
//!
//! - `POST /api/chat/{persona}` — drive the orchestration loop, streaming
//!   newline-delimited JSON events over a long-lived chunked response
//! - `GET /api/sessions`, `GET /api/sessions/{id}/messages` — observability
//!   reads over the persisted log
//! - `GET /health`, `GET /metrics` — liveness and Prometheus exposition

#![deny(unsafe_code)]

pub mod error;
pub mod metrics;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use provost_runtime::Orchestrator;

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// The run coordinator.
    pub orchestrator: Arc<Orchestrator>,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat/{persona}", post(routes::chat))
        .route("/api/sessions", get(routes::list_sessions))
        .route("/api/sessions/{id}/messages", get(routes::session_messages))
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::metrics))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
