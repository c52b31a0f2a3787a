//! Stream events written to the client during an agent run.
//!
//! Each [`AgentEvent`] is serialized as exactly one newline-delimited JSON
//! object with a `type` discriminator. Events are emitted strictly in
//! production order; the connection is closed once, immediately after the
//! terminal event (`chats` on success, `error` on any fatal outcome).

use serde::{Deserialize, Serialize};

use crate::messages::{Message, ToolCall};
use crate::tools::OperationOutcome;

/// Common fields for all stream events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Session this event belongs to.
    pub session_id: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
}

impl BaseEvent {
    /// Create a new base event with the current UTC timestamp.
    #[must_use]
    pub fn now(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// What made a run fail. Carried on every terminal `error` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The model gateway failed to produce a response.
    Gateway,
    /// Unknown tool or a handler raised an unexpected error.
    Dispatch,
    /// The model returned neither function calls nor text.
    Degenerate,
    /// The iteration bound ran out without a terminal sentinel.
    Exhausted,
    /// Store or other infrastructure failure.
    Internal,
}

// ─────────────────────────────────────────────────────────────────────────────
// agent_events! macro — generates AgentEvent, base(), event_type()
// ─────────────────────────────────────────────────────────────────────────────

/// Declarative macro that generates [`AgentEvent`], its `base()` and
/// `event_type()` accessors, and a compile-time `VARIANT_COUNT`.
///
/// Adding a new variant requires ONE edit (inside this invocation).
/// The compiler enforces exhaustive matching everywhere else.
macro_rules! agent_events {
    ($(
        $(#[doc = $doc:literal])*
        $variant:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $ty:ty
            ),*
            $(,)?
        } => $rename:literal
    ),* $(,)?) => {
        /// One line of the outbound NDJSON stream.
        ///
        /// Clients rely on the exact `type` strings and field names.
        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type")]
        #[allow(missing_docs)]
        pub enum AgentEvent {
            $(
                $(#[doc = $doc])*
                #[serde(rename = $rename)]
                $variant {
                    #[serde(flatten)]
                    base: BaseEvent,
                    $(
                        $(#[$fmeta])*
                        $field: $ty,
                    )*
                },
            )*
        }

        impl AgentEvent {
            /// Get the base event fields.
            #[must_use]
            pub fn base(&self) -> &BaseEvent {
                match self {
                    $(Self::$variant { base, .. } => base,)*
                }
            }

            /// Get the event type string (the `type` discriminator).
            #[must_use]
            pub fn event_type(&self) -> &str {
                match self {
                    $(Self::$variant { .. } => $rename,)*
                }
            }
        }

        /// Number of `AgentEvent` variants (compile-time constant for tests).
        #[cfg(test)]
        pub(crate) const VARIANT_COUNT: usize = [$($rename),*].len();
    };
}

agent_events! {
    /// Operational progress note (run started, title generated, ...).
    Log {
        message: String,
    } => "log",

    /// One tool call the model requested; emitted before it executes.
    FunctionCall {
        turn: u32,
        call: ToolCall,
    } => "function-call",

    /// One tool call finished; carries the envelope fed back to the model.
    FunctionResponse {
        turn: u32,
        #[serde(rename = "callId")]
        call_id: String,
        name: String,
        outcome: OperationOutcome,
        #[serde(rename = "durationMs")]
        duration_ms: u64,
    } => "function-response",

    /// Model text for a turn that terminates the run.
    ModelResponse {
        turn: u32,
        text: String,
        signal: crate::markup::ControlSignal,
    } => "model-response",

    /// Intermediate model text; the loop continues with a synthetic turn.
    Thought {
        turn: u32,
        text: String,
    } => "thought",

    /// Fatal failure. Always the last event of the stream.
    Error {
        kind: ErrorKind,
        message: String,
    } => "error",

    /// Full-window dump for observability. Terminal event on success.
    Chats {
        turns: u32,
        messages: Vec<Message>,
    } => "chats",
}

/// Convenience constructor for a `log` event.
pub fn log_event(session_id: &str, message: impl Into<String>) -> AgentEvent {
    AgentEvent::Log {
        base: BaseEvent::now(session_id),
        message: message.into(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
