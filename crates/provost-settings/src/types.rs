//! Settings types with compiled defaults.
//!
//! Every field has a serde default so a partial settings file deep-merges
//! cleanly over the compiled values.

use serde::{Deserialize, Serialize};

/// Root settings for the Provost agent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProvostSettings {
    /// HTTP server binding.
    pub server: ServerSettings,
    /// SQLite database location.
    pub database: DatabaseSettings,
    /// Model gateway configuration.
    pub gateway: GatewaySettings,
    /// Portal backend (domain operations) endpoint.
    pub backend: BackendSettings,
    /// Turn orchestrator tuning.
    pub orchestrator: OrchestratorSettings,
}

/// HTTP server binding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7310,
        }
    }
}

/// SQLite database location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseSettings {
    /// Path to the database file. `:memory:` gives an in-memory store.
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "provost.db".into(),
        }
    }
}

/// Model gateway configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewaySettings {
    /// Model identifier sent to the gateway.
    pub model: String,
    /// Base URL of the model service.
    pub base_url: String,
    /// API key. Usually supplied via `PROVOST_GATEWAY_API_KEY` or
    /// `GEMINI_API_KEY` rather than the settings file.
    pub api_key: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: String::new(),
        }
    }
}

/// Portal backend endpoint (the CRUD service the tools call).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendSettings {
    /// Base URL of the portal's internal operations API.
    pub base_url: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7311".into(),
        }
    }
}

/// Turn orchestrator tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrchestratorSettings {
    /// Iteration bound per run.
    pub max_turns: u32,
    /// Total concurrent runs accepted by the server.
    pub max_concurrent_runs: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_turns: 7,
            max_concurrent_runs: 16,
        }
    }
}
