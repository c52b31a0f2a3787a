//! Concurrent tool fan-out with a per-turn join barrier.
//!
//! All calls of a turn execute concurrently; the barrier joins them before
//! anything is persisted, so the turn's `function` message always carries
//! exactly one result per call. Results are kept in call order and matched
//! by name, so concurrency never reorders what the model sees.
//!
//! Event order is deterministic: every `function-call` event is emitted
//! before execution starts, and `function-response` events follow in call
//! order after the join.

use std::time::Instant;

use futures::future::join_all;
use tracing::instrument;

use provost_core::events::{AgentEvent, BaseEvent};
use provost_core::messages::{ToolCall, ToolResult};
use provost_tools::dispatch::dispatch;
use provost_tools::errors::DispatchError;
use provost_tools::registry::ToolRegistry;
use provost_tools::traits::ToolContext;

use crate::emitter::StreamEmitter;

/// Execute one turn's call batch. Returns all results in call order, or the
/// first fatal [`DispatchError`].
#[instrument(skip_all, fields(session_id = %ctx.session_id, calls = calls.len(), turn))]
pub async fn execute_calls(
    registry: &ToolRegistry,
    calls: &[ToolCall],
    ctx: &ToolContext,
    emitter: &StreamEmitter,
    turn: u32,
) -> Result<Vec<ToolResult>, DispatchError> {
    for call in calls {
        emitter
            .emit(AgentEvent::FunctionCall {
                base: BaseEvent::now(&ctx.session_id),
                turn,
                call: call.clone(),
            })
            .await;
    }

    let executions = calls.iter().map(|call| async move {
        let start = Instant::now();
        let result = dispatch(registry, call, ctx).await;
        (result, start.elapsed().as_millis() as u64)
    });
    let outcomes = join_all(executions).await;

    let mut results = Vec::with_capacity(calls.len());
    for (result, duration_ms) in outcomes {
        let result = result?;
        emitter
            .emit(AgentEvent::FunctionResponse {
                base: BaseEvent::now(&ctx.session_id),
                turn,
                call_id: result.call_id.clone(),
                name: result.name.clone(),
                outcome: result.outcome.clone(),
                duration_ms,
            })
            .await;
        results.push(result);
    }
    Ok(results)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
