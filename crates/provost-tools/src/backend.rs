//! The portal backend — the opaque domain-operation surface.
//!
//! Every CRUD operation the tools expose lives in the portal's existing
//! service layer, reached here through one uniform call: an operation name
//! plus a JSON parameter object in, an [`OperationOutcome`] envelope out.
//! The tools own argument typing and schemas; the backend stays opaque.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use provost_core::tools::OperationOutcome;

use crate::errors::ToolError;

#[cfg(test)]
use mockall::automock;

/// The portal's domain-operation surface.
///
/// A `success: false` envelope is a business rejection and flows back into
/// the conversation. `Err(ToolError)` means the backend itself failed —
/// unreachable, or answering outside the envelope — and aborts the run.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PortalBackend: Send + Sync {
    /// Invoke one named operation with a JSON parameter object.
    async fn invoke(&self, operation: &str, params: Value) -> Result<OperationOutcome, ToolError>;
}

/// Backend client over the portal's internal operations API.
///
/// `POST {base_url}/internal/ops/{operation}` with the parameter object as
/// the JSON body; every response body is the uniform envelope.
pub struct RestPortalBackend {
    base_url: String,
    client: reqwest::Client,
}

impl RestPortalBackend {
    /// Create a client for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PortalBackend for RestPortalBackend {
    #[instrument(skip_all, fields(operation))]
    async fn invoke(&self, operation: &str, params: Value) -> Result<OperationOutcome, ToolError> {
        let url = format!(
            "{}/internal/ops/{operation}",
            self.base_url.trim_end_matches('/')
        );
        let response = self.client.post(&url).json(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // The ops API answers the envelope on every status; anything that
        // does not parse as one is a backend fault, not a business result.
        let outcome: OperationOutcome = serde_json::from_str(&body).map_err(|_| {
            ToolError::MalformedEnvelope(format!(
                "status {status}, body: {}",
                provost_core::text::preview(&body, 200)
            ))
        })?;
        debug!(operation, success = outcome.success, "backend operation completed");
        Ok(outcome)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
