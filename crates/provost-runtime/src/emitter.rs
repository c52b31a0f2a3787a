//! The stream emitter — one [`AgentEvent`] per outbound NDJSON line.
//!
//! Events are pushed into a bounded channel whose receiver feeds the HTTP
//! response body. Two guarantees live here:
//!
//! - **Single close**: the terminal event goes through [`StreamEmitter::finish`],
//!   which consumes the emitter. Dropping the sender closes the channel, so
//!   the connection closes exactly once, immediately after the terminal
//!   event — never before, never twice. The type system enforces it.
//! - **Cancellation propagation**: a failed send means the client is gone.
//!   The emitter trips the run's `CancellationToken` so in-flight gateway
//!   and tool work stops instead of writing to a dead sink.

use metrics::counter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use provost_core::events::AgentEvent;

/// Emitter half of a run's event stream.
pub struct StreamEmitter {
    tx: mpsc::Sender<AgentEvent>,
    cancel: CancellationToken,
}

impl StreamEmitter {
    /// Wrap a channel sender and the run's cancellation token.
    #[must_use]
    pub fn new(tx: mpsc::Sender<AgentEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Emit a non-terminal event.
    ///
    /// A send failure (receiver dropped — the client disconnected) cancels
    /// the run token. The failure itself is not an error: the loop keeps
    /// its persistence work consistent and winds down on the next
    /// cancellation check.
    pub async fn emit(&self, event: AgentEvent) {
        counter!("stream_events_total", "type" => event.event_type().to_string()).increment(1);
        if self.tx.send(event).await.is_err() && !self.cancel.is_cancelled() {
            warn!("client disconnected, cancelling run");
            self.cancel.cancel();
        }
    }

    /// Emit the terminal event and close the stream.
    ///
    /// Consumes the emitter; dropping the sender ends the response body.
    pub async fn finish(self, event: AgentEvent) {
        debug!(event_type = event.event_type(), "terminal event");
        self.emit(event).await;
    }

    /// The run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use provost_core::events::log_event;

    #[tokio::test]
    async fn emit_delivers_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let emitter = StreamEmitter::new(tx, CancellationToken::new());

        emitter.emit(log_event("ses_1", "first")).await;
        emitter.emit(log_event("ses_1", "second")).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_matches::assert_matches!(first, AgentEvent::Log { message, .. } if message == "first");
        assert_matches::assert_matches!(second, AgentEvent::Log { message, .. } if message == "second");
    }

    #[tokio::test]
    async fn finish_closes_the_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let emitter = StreamEmitter::new(tx, CancellationToken::new());

        emitter.finish(log_event("ses_1", "bye")).await;

        let _ = rx.recv().await.unwrap();
        // Channel is closed once the emitter is consumed.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropped_receiver_cancels_the_run() {
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let emitter = StreamEmitter::new(tx, cancel.clone());

        drop(rx);
        assert!(!cancel.is_cancelled());
        emitter.emit(log_event("ses_1", "into the void")).await;
        assert!(cancel.is_cancelled());
    }
}
