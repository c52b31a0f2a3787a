//! Stateless tool dispatch.
//!
//! Looks a requested call up in the registry and invokes the handler,
//! normalizing the outcome into a [`ToolResult`]. The failure asymmetry is
//! deliberate and load-bearing:
//!
//! - unknown tool → [`DispatchError::UnknownTool`] (fatal)
//! - handler returned `Err` → [`DispatchError::Handler`] (fatal)
//! - handler returned `Ok(OperationOutcome { success: false, .. })` →
//!   a normal [`ToolResult`] fed back to the model (recoverable)

use metrics::{counter, histogram};
use std::time::Instant;
use tracing::{debug, error, instrument, warn};

use provost_core::messages::{ToolCall, ToolResult};
use serde_json::Value;

use crate::errors::{DispatchError, ToolError};
use crate::registry::{ToolName, ToolRegistry};
use crate::traits::ToolContext;

/// Dispatch one call. Returns the result to feed back to the model, or a
/// fatal [`DispatchError`] that aborts the run.
#[instrument(skip_all, fields(tool = %call.name, session_id = %ctx.session_id))]
pub async fn dispatch(
    registry: &ToolRegistry,
    call: &ToolCall,
    ctx: &ToolContext,
) -> Result<ToolResult, DispatchError> {
    let Some(name) = ToolName::parse(&call.name) else {
        error!(tool = %call.name, "model requested a tool that does not exist");
        return Err(DispatchError::UnknownTool(call.name.clone()));
    };
    let Some(tool) = registry.get(name) else {
        // Parseable but not registered for this persona — same failure class.
        error!(tool = %name, "tool not registered for this persona");
        return Err(DispatchError::UnknownTool(call.name.clone()));
    };

    if ctx.cancellation.is_cancelled() {
        return Err(DispatchError::Handler {
            name: call.name.clone(),
            source: ToolError::Cancelled,
        });
    }

    let start = Instant::now();
    let outcome = tool
        .execute(Value::Object(call.arguments.clone()), ctx)
        .await
        .map_err(|source| DispatchError::Handler {
            name: call.name.clone(),
            source,
        })?;

    counter!("tool_executions_total", "tool" => name.as_str()).increment(1);
    histogram!("tool_execution_duration_seconds", "tool" => name.as_str())
        .record(start.elapsed().as_secs_f64());

    if outcome.success {
        debug!(tool = %name, "tool executed");
    } else {
        warn!(tool = %name, error = outcome.error.as_deref().unwrap_or(""), "tool rejected");
    }

    Ok(ToolResult {
        call_id: call.id.clone(),
        name: call.name.clone(),
        outcome,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::PortalTool;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use provost_core::tools::{OperationOutcome, ToolDeclaration};
    use serde_json::{Map, json};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct OkTool;

    #[async_trait]
    impl PortalTool for OkTool {
        fn name(&self) -> ToolName {
            ToolName::ListPrograms
        }
        fn declaration(&self) -> ToolDeclaration {
            ToolDeclaration {
                name: "list_programs".into(),
                description: "list".into(),
                parameters: json!({"type": "object"}),
            }
        }
        async fn execute(
            &self,
            _args: Value,
            _ctx: &ToolContext,
        ) -> Result<OperationOutcome, ToolError> {
            Ok(OperationOutcome::ok(json!([{"code": "PHY"}])))
        }
    }

    struct RejectingTool;

    #[async_trait]
    impl PortalTool for RejectingTool {
        fn name(&self) -> ToolName {
            ToolName::CreateProgram
        }
        fn declaration(&self) -> ToolDeclaration {
            ToolDeclaration {
                name: "create_program".into(),
                description: "create".into(),
                parameters: json!({"type": "object"}),
            }
        }
        async fn execute(
            &self,
            _args: Value,
            _ctx: &ToolContext,
        ) -> Result<OperationOutcome, ToolError> {
            Ok(OperationOutcome::rejected("duplicate program code"))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl PortalTool for FailingTool {
        fn name(&self) -> ToolName {
            ToolName::DeleteProgram
        }
        fn declaration(&self) -> ToolDeclaration {
            ToolDeclaration {
                name: "delete_program".into(),
                description: "delete".into(),
                parameters: json!({"type": "object"}),
            }
        }
        async fn execute(
            &self,
            _args: Value,
            _ctx: &ToolContext,
        ) -> Result<OperationOutcome, ToolError> {
            Err(ToolError::MalformedEnvelope("no success field".into()))
        }
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(Arc::new(OkTool));
        r.register(Arc::new(RejectingTool));
        r.register(Arc::new(FailingTool));
        r
    }

    fn ctx() -> ToolContext {
        ToolContext::new("ses_1", CancellationToken::new())
    }

    fn call(name: &str) -> ToolCall {
        ToolCall::new("call_1", name, Map::new())
    }

    #[tokio::test]
    async fn successful_call_yields_result() {
        let result = dispatch(&registry(), &call("list_programs"), &ctx())
            .await
            .unwrap();
        assert_eq!(result.call_id, "call_1");
        assert_eq!(result.name, "list_programs");
        assert!(result.outcome.success);
    }

    #[tokio::test]
    async fn business_rejection_is_a_normal_result() {
        let result = dispatch(&registry(), &call("create_program"), &ctx())
            .await
            .unwrap();
        assert!(!result.outcome.success);
        assert_eq!(
            result.outcome.error.as_deref(),
            Some("duplicate program code")
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_fatal() {
        let err = dispatch(&registry(), &call("drop_database"), &ctx())
            .await
            .unwrap_err();
        assert_matches!(err, DispatchError::UnknownTool(name) if name == "drop_database");
    }

    #[tokio::test]
    async fn unregistered_tool_is_fatal() {
        // Parseable name, but not in this registry.
        let err = dispatch(&registry(), &call("enrollment_summary"), &ctx())
            .await
            .unwrap_err();
        assert_matches!(err, DispatchError::UnknownTool(_));
    }

    #[tokio::test]
    async fn handler_error_is_fatal_not_swallowed() {
        let err = dispatch(&registry(), &call("delete_program"), &ctx())
            .await
            .unwrap_err();
        assert_matches!(
            err,
            DispatchError::Handler {
                name,
                source: ToolError::MalformedEnvelope(_)
            } if name == "delete_program"
        );
    }

    #[tokio::test]
    async fn cancelled_context_aborts_dispatch() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ToolContext::new("ses_1", token);
        let err = dispatch(&registry(), &call("list_programs"), &ctx)
            .await
            .unwrap_err();
        assert_matches!(
            err,
            DispatchError::Handler {
                source: ToolError::Cancelled,
                ..
            }
        );
    }
}
