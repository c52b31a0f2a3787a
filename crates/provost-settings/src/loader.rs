//! Settings loading: defaults ← JSON file ← environment overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::Result;
use crate::types::ProvostSettings;

/// Default settings file location: `~/.provost/settings.json`.
#[must_use]
pub fn settings_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".provost")
        .join("settings.json")
}

/// Deep-merge `overlay` into `base`. Objects merge recursively; any other
/// value in the overlay replaces the base value wholesale.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        let _ = base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value.clone(),
    }
}

/// Load settings from the default path with env overrides applied.
pub fn load_settings() -> Result<ProvostSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`, deep-merged over compiled defaults, with
/// `PROVOST_*` env overrides applied last. A missing file is not an error —
/// defaults plus env are used.
pub fn load_settings_from_path(path: &Path) -> Result<ProvostSettings> {
    let mut merged = serde_json::to_value(ProvostSettings::default())?;

    if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let file_value: Value = serde_json::from_str(&raw)?;
        deep_merge(&mut merged, &file_value);
    }

    let mut settings: ProvostSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Apply `PROVOST_*` environment overrides (highest priority).
fn apply_env_overrides(settings: &mut ProvostSettings) {
    if let Ok(host) = std::env::var("PROVOST_SERVER_HOST") {
        settings.server.host = host;
    }
    if let Some(port) = env_parse::<u16>("PROVOST_SERVER_PORT") {
        settings.server.port = port;
    }
    if let Ok(path) = std::env::var("PROVOST_DB_PATH") {
        settings.database.path = path;
    }
    if let Ok(model) = std::env::var("PROVOST_GATEWAY_MODEL") {
        settings.gateway.model = model;
    }
    if let Ok(url) = std::env::var("PROVOST_GATEWAY_BASE_URL") {
        settings.gateway.base_url = url;
    }
    if let Ok(key) = std::env::var("PROVOST_GATEWAY_API_KEY") {
        settings.gateway.api_key = key;
    } else if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        settings.gateway.api_key = key;
    }
    if let Ok(url) = std::env::var("PROVOST_BACKEND_BASE_URL") {
        settings.backend.base_url = url;
    }
    if let Some(turns) = env_parse::<u32>("PROVOST_MAX_TURNS") {
        settings.orchestrator.max_turns = turns;
    }
    if let Some(runs) = env_parse::<usize>("PROVOST_MAX_CONCURRENT_RUNS") {
        settings.orchestrator.max_concurrent_runs = runs;
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "ignoring unparseable env override");
                None
            }
        },
        Err(_) => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
