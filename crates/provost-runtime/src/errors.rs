//! Runtime errors.
//!
//! These cover failures *before* the stream is established (busy session,
//! unknown persona, store trouble while resolving the session). Once the
//! loop is running, failures are reported on the stream itself as terminal
//! `error` events and never surface here.

use thiserror::Error;

/// Result alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised by the orchestrator outside the event stream.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The session already has an active run.
    #[error("session busy: {0}")]
    SessionBusy(String),

    /// The server is at its concurrent-run limit.
    #[error("server busy: {current}/{max} runs active")]
    ServerBusy {
        /// Currently active runs.
        current: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Session store failure while setting up the run.
    #[error(transparent)]
    Store(#[from] provost_store::StoreError),

    /// The request named a persona that does not exist.
    #[error("unknown persona: {0}")]
    UnknownPersona(String),
}
