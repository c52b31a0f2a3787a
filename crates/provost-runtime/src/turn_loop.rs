//! The turn loop — the state machine driving one agent run.
//!
//! States: awaiting model → (executing tools | emitting text) → awaiting
//! model | terminated. Each iteration submits the full window to the
//! gateway, partitions the response, and either executes the call batch or
//! checks the text for a control sentinel.
//!
//! Branch rules, in order:
//!
//! 1. Function calls present → tool branch. Any co-occurring text is
//!    discarded for the turn (calls win the tie-break).
//! 2. Text present → persist it; a control sentinel terminates the run,
//!    otherwise a synthetic continuation turn is appended and the loop
//!    goes around.
//! 3. Neither → degenerate, fatal.
//!
//! Failure taxonomy: a tool's business rejection is conversational and
//! loops; gateway, dispatch, degenerate, and exhaustion failures each emit
//! one terminal `error` event with a distinct kind. Nothing is retried.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, error, instrument, warn};

use provost_core::events::{AgentEvent, BaseEvent, ErrorKind};
use provost_core::markup::{SENTINEL_AWAIT_INPUT, SENTINEL_COMPLETE, detect_control_signal};
use provost_core::messages::{ConversationWindow, Message, MessageContent, Role};
use provost_core::tools::ToolDeclaration;
use provost_llm::ModelGateway;
use provost_store::SessionStore;
use provost_tools::registry::ToolRegistry;
use provost_tools::traits::ToolContext;

use crate::emitter::StreamEmitter;
use crate::executor::execute_calls;
use crate::persona::Persona;

/// The synthetic user turn appended when the model produced sentinel-free
/// text and the loop keeps going.
pub fn continuation_prompt() -> String {
    format!(
        "Continue. Reply with {SENTINEL_AWAIT_INPUT} if you need more information \
         from the user, or {SENTINEL_COMPLETE} when the task is finished."
    )
}

/// One run of the orchestration loop over a single session.
pub struct TurnLoop {
    /// Session store (persists every turn).
    pub store: Arc<SessionStore>,
    /// Model gateway.
    pub gateway: Arc<dyn ModelGateway>,
    /// The persona's tool table.
    pub registry: Arc<ToolRegistry>,
    /// Persona driving instructions and greeting.
    pub persona: Persona,
    /// Session being driven.
    pub session_id: String,
    /// Iteration bound.
    pub max_turns: u32,
}

impl TurnLoop {
    /// Drive the loop to completion. Emits every event for the run and
    /// always closes the stream with exactly one terminal event.
    #[instrument(skip_all, fields(session_id = %self.session_id, persona = %self.persona))]
    pub async fn run(self, mut window: ConversationWindow, emitter: StreamEmitter) {
        let instructions = self.persona.instructions();
        let declarations = self.registry.declarations();
        let ctx = ToolContext::new(&self.session_id, emitter.cancellation().clone());

        let terminal = self
            .drive(&mut window, &emitter, &ctx, &instructions, &declarations)
            .await;
        emitter.finish(terminal).await;
    }

    /// The iteration loop proper. Returns the terminal event.
    async fn drive(
        &self,
        window: &mut ConversationWindow,
        emitter: &StreamEmitter,
        ctx: &ToolContext,
        instructions: &str,
        declarations: &[ToolDeclaration],
    ) -> AgentEvent {
        for turn in 1..=self.max_turns {
            counter!("agent_turns_total", "persona" => self.persona.as_str()).increment(1);
            let turn_start = Instant::now();

            let response = match self
                .gateway
                .send_turn(window, declarations, instructions, &ctx.cancellation)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!(turn, error = %e, "gateway failure");
                    return self.error_event(ErrorKind::Gateway, e.to_string());
                }
            };
            histogram!("agent_turn_duration_seconds", "persona" => self.persona.as_str())
                .record(turn_start.elapsed().as_secs_f64());

            if response.has_calls() {
                // Tie-break: calls win, co-occurring text is dropped.
                if !response.text_parts.is_empty() {
                    debug!(turn, "discarding text parts accompanying function calls");
                }
                let calls = response.function_calls;

                let content = MessageContent::ToolCalls {
                    calls: calls.clone(),
                };
                if let Err(e) = self.persist(Role::Model, &content) {
                    return self.error_event(ErrorKind::Internal, e.to_string());
                }
                window.push(Message::model_calls(calls.clone()));

                let results = match execute_calls(&self.registry, &calls, ctx, emitter, turn).await
                {
                    Ok(results) => results,
                    Err(e) => {
                        error!(turn, error = %e, "tool dispatch failure");
                        return self.error_event(ErrorKind::Dispatch, e.to_string());
                    }
                };

                // Join barrier done: exactly one result per call, grouped
                // into a single function message for the turn.
                let content = MessageContent::ToolResults {
                    results: results.clone(),
                };
                if let Err(e) = self.persist(Role::Function, &content) {
                    return self.error_event(ErrorKind::Internal, e.to_string());
                }
                window.push(Message::function_results(results));
                continue;
            }

            let text = response.joined_text();
            if text.is_empty() {
                warn!(turn, "model returned neither function calls nor text");
                return self.error_event(
                    ErrorKind::Degenerate,
                    "model returned neither function calls nor text",
                );
            }

            let content = MessageContent::Text { text: text.clone() };
            if let Err(e) = self.persist(Role::Model, &content) {
                return self.error_event(ErrorKind::Internal, e.to_string());
            }
            window.push(Message::model_text(text.clone()));

            if let Some(signal) = detect_control_signal(&text) {
                debug!(turn, ?signal, "control sentinel detected, terminating");
                emitter
                    .emit(AgentEvent::ModelResponse {
                        base: BaseEvent::now(&self.session_id),
                        turn,
                        text,
                        signal,
                    })
                    .await;
                return AgentEvent::Chats {
                    base: BaseEvent::now(&self.session_id),
                    turns: turn,
                    messages: window.messages().to_vec(),
                };
            }

            // No sentinel: one synthetic continuation turn, then loop.
            let prompt = continuation_prompt();
            if let Err(e) = self.persist(Role::User, &MessageContent::Text { text: prompt.clone() })
            {
                return self.error_event(ErrorKind::Internal, e.to_string());
            }
            window.push(Message::user(prompt));
            emitter
                .emit(AgentEvent::Thought {
                    base: BaseEvent::now(&self.session_id),
                    turn,
                    text,
                })
                .await;
        }

        warn!(max_turns = self.max_turns, "iteration bound exhausted");
        self.error_event(
            ErrorKind::Exhausted,
            format!(
                "iteration bound of {} reached without a terminal sentinel",
                self.max_turns
            ),
        )
    }

    fn persist(&self, role: Role, content: &MessageContent) -> provost_store::Result<()> {
        self.store
            .append_message(&self.session_id, role, content)
            .map(|_| ())
    }

    fn error_event(&self, kind: ErrorKind, message: impl Into<String>) -> AgentEvent {
        counter!("agent_runs_failed_total", "kind" => format!("{kind:?}").to_lowercase())
            .increment(1);
        AgentEvent::Error {
            base: BaseEvent::now(&self.session_id),
            kind,
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
