//! # provost-llm
//!
//! The model gateway: a single request/response call that submits the full
//! conversation window plus the tool schema and returns the model's
//! function-call parts and text parts.
//!
//! The gateway is stateless per call and carries **no retry logic** — any
//! transport or API error surfaces to the orchestrator as a failure to
//! obtain a response, which is fatal for the run.

#![deny(unsafe_code)]

pub mod gemini;

pub use gemini::{GeminiConfig, GeminiGateway};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use provost_core::messages::{ConversationWindow, ToolCall};
use provost_core::tools::ToolDeclaration;

/// Result alias for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Errors raised by a model gateway. All of them are fatal to a run.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure.
    #[error("model transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success API response.
    #[error("model API error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },

    /// Rate limited. Kept distinct for log fidelity; still not retried.
    #[error("model rate limited: {message}")]
    RateLimited {
        /// Message extracted from the error body.
        message: String,
    },

    /// The response body did not parse.
    #[error("model response malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// The run was cancelled while the request was in flight.
    #[error("model call cancelled")]
    Cancelled,
}

/// One model response, partitioned into its two part families.
///
/// The orchestrator's tie-break rule lives on top of this: when both are
/// non-empty, the function calls win and the text is discarded for the turn.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelTurn {
    /// Function-call parts, in model order.
    pub function_calls: Vec<ToolCall>,
    /// Text parts, in model order.
    pub text_parts: Vec<String>,
}

impl ModelTurn {
    /// Whether the model requested any tool calls.
    #[must_use]
    pub fn has_calls(&self) -> bool {
        !self.function_calls.is_empty()
    }

    /// All text parts joined into one body.
    #[must_use]
    pub fn joined_text(&self) -> String {
        self.text_parts.join("\n")
    }

    /// Neither calls nor text — the degenerate shape.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.function_calls.is_empty() && self.text_parts.is_empty()
    }
}

/// A conversational model reachable via a single request/response call.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Submit the complete window, the tool schema, and the persona
    /// instructions; return the partitioned response.
    async fn send_turn(
        &self,
        window: &ConversationWindow,
        tools: &[ToolDeclaration],
        instructions: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<ModelTurn>;

    /// One-shot title suggestion for a new session. Best-effort: callers
    /// treat failure as log-and-drop.
    async fn generate_title(&self, prompt: &str) -> GatewayResult<String>;
}
