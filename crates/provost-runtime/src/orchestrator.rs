//! Orchestrator — per-session single-flight run coordination.
//!
//! One session, one loop: a second request against a session with an active
//! run is rejected up front rather than allowed to interleave appends. A
//! semaphore bounds total concurrent runs across all sessions.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::gauge;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use provost_core::events::{AgentEvent, log_event};
use provost_core::ids::new_run_id;
use provost_core::messages::{ConversationWindow, Message, MessageContent};
use provost_llm::ModelGateway;
use provost_store::SessionStore;
use provost_tools::backend::PortalBackend;
use provost_tools::registry::ToolRegistry;

use crate::emitter::StreamEmitter;
use crate::errors::{Result, RuntimeError};
use crate::persona::Persona;
use crate::turn_loop::TurnLoop;

/// Inbound chat request, already routed to a persona.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    /// Persona (and tool table) to run under.
    pub persona: Persona,
    /// The user's prompt.
    pub prompt: String,
    /// Existing session to continue; a new one is created when absent or
    /// unknown.
    pub session_id: Option<String>,
    /// Client-supplied history, seeded only into a *new* session. The
    /// persisted log stays authoritative for existing sessions.
    pub prior_messages: Vec<Message>,
    /// Whether to kick off the fire-and-forget title generation.
    pub title_requested: bool,
}

/// A claimed run slot: session resolved, single-flight check passed.
///
/// Produced by [`Orchestrator::prepare`]; consumed by
/// [`Orchestrator::execute`]. Dropping it without executing leaks the run
/// slot until `complete_run`, so callers hand it straight to `execute`.
pub struct PreparedRun {
    /// The session this run will drive.
    pub session_id: String,
    /// Run identifier (`run_` prefix), for logs and correlation.
    pub run_id: String,
    cancel: CancellationToken,
    request: ChatRequest,
}

/// Tracks an active agent run within a session.
struct ActiveRun {
    run_id: String,
    cancel: CancellationToken,
    /// RAII guard — released when the run is removed from `active_runs`.
    _permit: OwnedSemaphorePermit,
}

/// Multi-session run coordinator.
pub struct Orchestrator {
    store: Arc<SessionStore>,
    gateway: Arc<dyn ModelGateway>,
    academic_registry: Arc<ToolRegistry>,
    reporting_registry: Arc<ToolRegistry>,
    max_turns: u32,
    max_concurrent_runs: usize,
    /// Semaphore limiting total concurrent agent runs.
    run_semaphore: Arc<Semaphore>,
    /// Active runs keyed by `session_id`.
    active_runs: Mutex<HashMap<String, ActiveRun>>,
}

impl Orchestrator {
    /// Create a new orchestrator. The persona registries are built once
    /// over the shared backend.
    pub fn new(
        store: Arc<SessionStore>,
        gateway: Arc<dyn ModelGateway>,
        backend: Arc<dyn PortalBackend>,
        max_turns: u32,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            store,
            gateway,
            academic_registry: Arc::new(Persona::Academic.registry(Arc::clone(&backend))),
            reporting_registry: Arc::new(Persona::Reporting.registry(backend)),
            max_turns,
            max_concurrent_runs,
            run_semaphore: Arc::new(Semaphore::new(max_concurrent_runs)),
            active_runs: Mutex::new(HashMap::new()),
        }
    }

    /// The session store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    fn registry_for(&self, persona: Persona) -> Arc<ToolRegistry> {
        match persona {
            Persona::Academic => Arc::clone(&self.academic_registry),
            Persona::Reporting => Arc::clone(&self.reporting_registry),
        }
    }

    /// Start tracking a run for a session. Returns the `CancellationToken`.
    ///
    /// Errors if:
    /// - The session already has an active run (`SessionBusy`)
    /// - The server is at max concurrent runs (`ServerBusy`)
    #[instrument(skip(self), fields(session_id, run_id))]
    pub fn start_run(&self, session_id: &str, run_id: &str) -> Result<CancellationToken> {
        let mut runs = self.active_runs.lock();
        if runs.contains_key(session_id) {
            return Err(RuntimeError::SessionBusy(session_id.to_string()));
        }
        // Acquire a concurrency permit (non-blocking).
        let permit = Arc::clone(&self.run_semaphore)
            .try_acquire_owned()
            .map_err(|_| RuntimeError::ServerBusy {
                current: runs.len(),
                max: self.max_concurrent_runs,
            })?;
        let cancel = CancellationToken::new();
        let _ = runs.insert(
            session_id.to_string(),
            ActiveRun {
                run_id: run_id.to_string(),
                cancel: cancel.clone(),
                _permit: permit,
            },
        );
        gauge!("agent_runs_active").set(runs.len() as f64);
        info!(session_id, run_id, "run started");
        Ok(cancel)
    }

    /// Complete a run for a session (removes it from active tracking).
    #[instrument(skip(self), fields(session_id))]
    pub fn complete_run(&self, session_id: &str) {
        debug!(session_id, "run completed");
        let mut runs = self.active_runs.lock();
        let _ = runs.remove(session_id);
        gauge!("agent_runs_active").set(runs.len() as f64);
    }

    /// Check if a session has an active run.
    pub fn has_active_run(&self, session_id: &str) -> bool {
        self.active_runs.lock().contains_key(session_id)
    }

    /// Get the run ID for an active session (if any).
    pub fn get_run_id(&self, session_id: &str) -> Option<String> {
        self.active_runs
            .lock()
            .get(session_id)
            .map(|r| r.run_id.clone())
    }

    /// Number of active runs.
    pub fn active_run_count(&self) -> usize {
        self.active_runs.lock().len()
    }

    /// Abort a running session by cancelling its token. Returns `true` if
    /// the session had an active run.
    #[instrument(skip(self), fields(session_id))]
    pub fn abort(&self, session_id: &str) -> bool {
        let runs = self.active_runs.lock();
        if let Some(run) = runs.get(session_id) {
            warn!(session_id, "abort requested");
            run.cancel.cancel();
            true
        } else {
            false
        }
    }

    /// Graceful shutdown — cancel every active run.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        info!("orchestrator shutdown initiated");
        let runs = self.active_runs.lock();
        for run in runs.values() {
            run.cancel.cancel();
        }
    }

    /// Resolve the session and claim the run slot. Failures here (busy
    /// session, server at capacity, store trouble, unknown session) happen
    /// *before* any event is emitted, so callers can map them to plain
    /// HTTP errors instead of a half-open stream.
    #[instrument(skip_all, fields(persona = %request.persona))]
    pub fn prepare(&self, request: ChatRequest) -> Result<PreparedRun> {
        let session = self.resolve_session(&request)?;
        let run_id = new_run_id();
        let cancel = self.start_run(&session.id, &run_id)?;
        Ok(PreparedRun {
            session_id: session.id,
            run_id,
            cancel,
            request,
        })
    }

    /// Drive a prepared run to completion, emitting every event into
    /// `events_tx`. Always releases the run slot, and always closes the
    /// stream with exactly one terminal event.
    #[instrument(skip_all, fields(session_id = %prepared.session_id, run_id = %prepared.run_id))]
    pub async fn execute(&self, prepared: PreparedRun, events_tx: mpsc::Sender<AgentEvent>) {
        let emitter = StreamEmitter::new(events_tx, prepared.cancel.clone());
        let session_id = &prepared.session_id;
        let request = &prepared.request;

        // Append the user prompt, then rebuild the window from the full
        // persisted log so the two cannot drift.
        let setup = self
            .store
            .append_message(
                session_id,
                provost_core::messages::Role::User,
                &MessageContent::Text {
                    text: request.prompt.clone(),
                },
            )
            .and_then(|_| self.store.load_history(session_id));

        match setup {
            Ok(history) => {
                if request.title_requested {
                    self.spawn_title_task(session_id, &request.prompt);
                }
                let window = ConversationWindow::from_history(history);
                emitter.emit(log_event(session_id, "run started")).await;

                let turn_loop = TurnLoop {
                    store: Arc::clone(&self.store),
                    gateway: Arc::clone(&self.gateway),
                    registry: self.registry_for(request.persona),
                    persona: request.persona,
                    session_id: session_id.clone(),
                    max_turns: self.max_turns,
                };
                turn_loop.run(window, emitter).await;
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "run setup failed");
                emitter
                    .finish(AgentEvent::Error {
                        base: provost_core::events::BaseEvent::now(session_id),
                        kind: provost_core::events::ErrorKind::Internal,
                        message: e.to_string(),
                    })
                    .await;
            }
        }
        self.complete_run(&prepared.session_id);
    }

    /// Prepare and execute in one step. Convenience for tests and callers
    /// that do not need the pre-stream error split.
    pub async fn run_chat(
        &self,
        request: ChatRequest,
        events_tx: mpsc::Sender<AgentEvent>,
    ) -> Result<String> {
        let prepared = self.prepare(request)?;
        let session_id = prepared.session_id.clone();
        self.execute(prepared, events_tx).await;
        Ok(session_id)
    }

    /// Resolve the request to a session row, creating (and seeding) a new
    /// session when needed.
    fn resolve_session(&self, request: &ChatRequest) -> Result<provost_store::SessionRow> {
        if let Some(id) = &request.session_id {
            if let Some(session) = self.store.get_session(id)? {
                return Ok(session);
            }
            warn!(session_id = %id, "unknown session id, creating a fresh session");
        }

        let session = self
            .store
            .create_session(request.persona.as_str(), request.persona.greeting())?;

        // Client-supplied history only seeds a brand-new session.
        for message in &request.prior_messages {
            let _ = self
                .store
                .append_message(&session.id, message.role, &message.content)?;
        }
        debug!(session_id = %session.id, seeded = request.prior_messages.len(), "session created");
        self.store
            .get_session(&session.id)?
            .ok_or_else(|| RuntimeError::Store(provost_store::StoreError::Internal(
                "session vanished after create".into(),
            )))
    }

    /// Fire-and-forget title generation. One-shot per session; failure
    /// never blocks or fails the main loop.
    fn spawn_title_task(&self, session_id: &str, prompt: &str) {
        let gateway = Arc::clone(&self.gateway);
        let store = Arc::clone(&self.store);
        let session_id = session_id.to_string();
        let prompt = prompt.to_string();
        let _handle = tokio::spawn(async move {
            match store.get_session(&session_id) {
                Ok(Some(session)) if session.title.is_none() => {}
                _ => return,
            }
            match gateway.generate_title(&prompt).await {
                Ok(title) if !title.is_empty() => match store.set_title(&session_id, &title) {
                    Ok(_) => debug!(session_id = %session_id, title = %title, "session titled"),
                    Err(e) => warn!(session_id = %session_id, error = %e, "failed to store title"),
                },
                Ok(_) => debug!(session_id = %session_id, "title generation returned empty text"),
                Err(e) => warn!(session_id = %session_id, error = %e, "title generation failed"),
            }
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use provost_core::tools::OperationOutcome;
    use provost_llm::{GatewayError, GatewayResult, ModelTurn};
    use provost_store::{ConnectionConfig, new_in_memory, run_migrations};
    use provost_tools::errors::ToolError;
    use serde_json::{Value, json};
    use std::collections::VecDeque;

    struct ScriptedGateway {
        script: parking_lot::Mutex<VecDeque<GatewayResult<ModelTurn>>>,
        title: Option<String>,
    }

    impl ScriptedGateway {
        fn completing(title: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                script: parking_lot::Mutex::new(
                    vec![Ok(ModelTurn {
                        function_calls: vec![],
                        text_parts: vec!["[P]Done.[/P][CONVERSATION_COMPLETE]".into()],
                    })]
                    .into(),
                ),
                title: title.map(String::from),
            })
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn send_turn(
            &self,
            _window: &ConversationWindow,
            _tools: &[provost_core::tools::ToolDeclaration],
            _instructions: &str,
            _cancel: &CancellationToken,
        ) -> GatewayResult<ModelTurn> {
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(ModelTurn::default()))
        }

        async fn generate_title(&self, _prompt: &str) -> GatewayResult<String> {
            match &self.title {
                Some(title) => Ok(title.clone()),
                None => Err(GatewayError::Api {
                    status: 500,
                    message: "title service down".into(),
                }),
            }
        }
    }

    struct StubBackend;

    #[async_trait]
    impl provost_tools::backend::PortalBackend for StubBackend {
        async fn invoke(
            &self,
            _operation: &str,
            _params: Value,
        ) -> std::result::Result<OperationOutcome, ToolError> {
            Ok(OperationOutcome::ok(json!({})))
        }
    }

    fn make_orchestrator(gateway: Arc<ScriptedGateway>) -> Orchestrator {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            let _ = run_migrations(&conn).unwrap();
        }
        Orchestrator::new(
            Arc::new(SessionStore::new(pool)),
            gateway,
            Arc::new(StubBackend),
            7,
            4,
        )
    }

    fn request(session_id: Option<String>) -> ChatRequest {
        ChatRequest {
            persona: Persona::Academic,
            prompt: "create a program called Physics with code PHY".into(),
            session_id,
            prior_messages: vec![],
            title_requested: false,
        }
    }

    // ── Run tracking ────────────────────────────────────────────────────

    #[test]
    fn start_run_creates_token() {
        let orch = make_orchestrator(ScriptedGateway::completing(None));
        let token = orch.start_run("ses_1", "run_1").unwrap();
        assert!(!token.is_cancelled());
        assert!(orch.has_active_run("ses_1"));
        assert_eq!(orch.active_run_count(), 1);
    }

    #[test]
    fn start_run_rejects_busy_session() {
        let orch = make_orchestrator(ScriptedGateway::completing(None));
        let _token = orch.start_run("ses_1", "run_1").unwrap();
        let err = orch.start_run("ses_1", "run_2").unwrap_err();
        assert_matches!(err, RuntimeError::SessionBusy(_));
    }

    #[test]
    fn start_run_rejects_at_capacity() {
        let orch = make_orchestrator(ScriptedGateway::completing(None)); // max 4
        for i in 0..4 {
            let _ = orch.start_run(&format!("ses_{i}"), &format!("run_{i}")).unwrap();
        }
        let err = orch.start_run("ses_5", "run_5").unwrap_err();
        assert_matches!(err, RuntimeError::ServerBusy { current: 4, max: 4 });
    }

    #[test]
    fn permit_released_on_complete() {
        let orch = make_orchestrator(ScriptedGateway::completing(None));
        for i in 0..4 {
            let _ = orch.start_run(&format!("ses_{i}"), &format!("run_{i}")).unwrap();
        }
        orch.complete_run("ses_0");
        assert_eq!(orch.active_run_count(), 3);
        let _ = orch.start_run("ses_5", "run_5").unwrap();
    }

    #[test]
    fn abort_cancels_token() {
        let orch = make_orchestrator(ScriptedGateway::completing(None));
        let token = orch.start_run("ses_1", "run_1").unwrap();
        assert!(orch.abort("ses_1"));
        assert!(token.is_cancelled());
        assert!(!orch.abort("ses_unknown"));
    }

    #[test]
    fn shutdown_cancels_all_runs() {
        let orch = make_orchestrator(ScriptedGateway::completing(None));
        let t1 = orch.start_run("ses_1", "run_1").unwrap();
        let t2 = orch.start_run("ses_2", "run_2").unwrap();
        orch.shutdown();
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
    }

    // ── run_chat ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn run_chat_creates_session_and_streams_to_terminal() {
        let orch = make_orchestrator(ScriptedGateway::completing(None));
        let (tx, mut rx) = mpsc::channel(64);

        let session_id = orch.run_chat(request(None), tx).await.unwrap();

        let mut types = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.base().session_id, session_id);
            types.push(event.event_type().to_string());
        }
        assert_eq!(types, vec!["log", "model-response", "chats"]);

        // Run slot was released.
        assert!(!orch.has_active_run(&session_id));
        let session = orch.store().get_session(&session_id).unwrap().unwrap();
        assert_eq!(session.category, "academic");
        // greeting + user prompt + model response
        assert_eq!(session.message_count, 3);
    }

    #[tokio::test]
    async fn run_chat_continues_existing_session() {
        let orch = make_orchestrator(ScriptedGateway::completing(None));
        let existing = orch
            .store()
            .create_session("academic", Persona::Academic.greeting())
            .unwrap();

        let (tx, mut rx) = mpsc::channel(64);
        let session_id = orch
            .run_chat(request(Some(existing.id.clone())), tx)
            .await
            .unwrap();
        assert_eq!(session_id, existing.id);
        while rx.recv().await.is_some() {}

        let history = orch.store().load_history(&existing.id).unwrap();
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn run_chat_rejects_busy_session_before_streaming() {
        let orch = make_orchestrator(ScriptedGateway::completing(None));
        let session = orch
            .store()
            .create_session("academic", Persona::Academic.greeting())
            .unwrap();
        let _token = orch.start_run(&session.id, "run_1").unwrap();

        let (tx, mut rx) = mpsc::channel(64);
        let err = orch
            .run_chat(request(Some(session.id.clone())), tx)
            .await
            .unwrap_err();
        assert_matches!(err, RuntimeError::SessionBusy(_));
        // No events were emitted.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn prior_messages_seed_new_sessions_only() {
        let orch = make_orchestrator(ScriptedGateway::completing(None));
        let mut req = request(None);
        req.prior_messages = vec![
            Message::user("earlier question"),
            Message::model_text("[P]earlier answer[/P]"),
        ];

        let (tx, mut rx) = mpsc::channel(64);
        let session_id = orch.run_chat(req, tx).await.unwrap();
        while rx.recv().await.is_some() {}

        let history = orch.store().load_history(&session_id).unwrap();
        // greeting, 2 seeded, prompt, model response
        assert_eq!(history.len(), 5);
        assert_eq!(history[1].content.as_text(), Some("earlier question"));
    }

    #[tokio::test]
    async fn title_task_sets_title_eventually() {
        let orch = make_orchestrator(ScriptedGateway::completing(Some("Physics setup")));
        let mut req = request(None);
        req.title_requested = true;

        let (tx, mut rx) = mpsc::channel(64);
        let session_id = orch.run_chat(req, tx).await.unwrap();
        while rx.recv().await.is_some() {}

        // Fire-and-forget: poll briefly for the spawned task to land.
        let mut title = None;
        for _ in 0..50 {
            title = orch.store().get_session(&session_id).unwrap().unwrap().title;
            if title.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(title.as_deref(), Some("Physics setup"));
    }

    #[tokio::test]
    async fn title_failure_never_fails_the_run() {
        let orch = make_orchestrator(ScriptedGateway::completing(None)); // title errors
        let mut req = request(None);
        req.title_requested = true;

        let (tx, mut rx) = mpsc::channel(64);
        let session_id = orch.run_chat(req, tx).await.unwrap();

        let mut saw_terminal = false;
        while let Some(event) = rx.recv().await {
            saw_terminal = event.event_type() == "chats";
        }
        assert!(saw_terminal);
        // Title stays unset, session is otherwise intact.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let session = orch.store().get_session(&session_id).unwrap().unwrap();
        assert!(session.title.is_none());
    }
}
