//! Tool and dispatch errors.
//!
//! The error split carries the loop's failure taxonomy:
//!
//! - A handler that *returns* `OperationOutcome { success: false }` reports a
//!   business rejection. That is not an error type at all — it is fed back
//!   to the model as a function result and the conversation continues.
//! - A handler that returns [`ToolError`] hit something unexpected
//!   (transport failure, malformed envelope). That is never swallowed into
//!   a result; it aborts the whole run.

use thiserror::Error;

/// Unexpected failure inside a tool handler. Fatal for the run.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The portal backend was unreachable or the transport failed.
    #[error("backend transport error: {0}")]
    Backend(#[from] reqwest::Error),

    /// The backend answered outside the uniform envelope.
    #[error("backend returned a malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The run was cancelled while the handler was in flight.
    #[error("tool execution cancelled")]
    Cancelled,
}

/// Fatal dispatch failure.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The model named a tool that is not in the registry. A programming
    /// (or prompting) error, not a recoverable business error.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A handler raised an unexpected error.
    #[error("tool '{name}' failed: {source}")]
    Handler {
        /// Wire name of the failing tool.
        name: String,
        /// The underlying failure.
        source: ToolError,
    },
}
