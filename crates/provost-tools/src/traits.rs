//! The tool trait and execution context.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use provost_core::tools::{OperationOutcome, ToolDeclaration};

use crate::errors::ToolError;
use crate::registry::ToolName;

/// Per-run context threaded into every tool execution.
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Session the run belongs to.
    pub session_id: String,
    /// Cancelled when the client disconnects or the run is aborted.
    pub cancellation: CancellationToken,
}

impl ToolContext {
    /// Context for a run.
    pub fn new(session_id: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            session_id: session_id.into(),
            cancellation,
        }
    }
}

/// A named backend operation exposed to the model.
///
/// `Ok(outcome)` is always conversational — including `success: false`
/// business rejections. `Err(ToolError)` is reserved for unexpected
/// failures and aborts the run.
#[async_trait]
pub trait PortalTool: Send + Sync {
    /// Typed registry tag.
    fn name(&self) -> ToolName;

    /// Schema entry advertised to the model.
    fn declaration(&self) -> ToolDeclaration;

    /// Execute with the model-supplied argument map.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<OperationOutcome, ToolError>;
}

/// Deserialize a model-supplied argument map into a typed argument struct.
///
/// A shape mismatch is a business rejection (the model can retry with
/// corrected arguments), so the error is a plain string for
/// [`OperationOutcome::rejected`], not a [`ToolError`].
pub fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))
}
