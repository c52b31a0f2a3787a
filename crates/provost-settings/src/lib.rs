//! # provost-settings
//!
//! Configuration management with layered sources for the Provost agent.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`ProvostSettings::default()`]
//! 2. **User file** — `~/.provost/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `PROVOST_*` overrides (highest priority)
//!
//! The global singleton is reloadable: ops tooling can rewrite the settings
//! file and call [`reload_settings_from_path`] to swap the cached value so
//! all subsequent [`get_settings`] calls return fresh data.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::path::Path;
use std::sync::{Arc, RwLock};

/// Global settings singleton.
///
/// Uses `RwLock<Option<Arc<ProvostSettings>>>` instead of `OnceLock` so the
/// cached value can be swapped after a reload. Reads are cheap (shared lock
/// + `Arc::clone`); writes only happen on reload.
static SETTINGS: RwLock<Option<Arc<ProvostSettings>>> = RwLock::new(None);

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.provost/settings.json` with env
/// overrides. On subsequent calls, returns the cached value. If loading
/// fails, returns compiled defaults.
pub fn get_settings() -> Arc<ProvostSettings> {
    // Fast path: read lock
    {
        let guard = SETTINGS.read().expect("settings lock poisoned");
        if let Some(ref s) = *guard {
            return Arc::clone(s);
        }
    }

    // Slow path: first access, take write lock
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    // Double-check after acquiring write lock (another thread may have initialized)
    if let Some(ref s) = *guard {
        return Arc::clone(s);
    }

    let settings = Arc::new(match load_settings() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            ProvostSettings::default()
        }
    });
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Initialize the global settings with a specific value.
///
/// Replaces any previously cached settings. Useful for tests and server
/// startup where the settings path is known.
pub fn init_settings(settings: ProvostSettings) {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(Arc::new(settings));
}

/// Reload settings from a specific file path and swap the global cache.
pub fn reload_settings_from_path(path: &Path) {
    let new = Arc::new(match load_settings_from_path(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, ?path, "failed to reload settings, falling back to defaults");
            ProvostSettings::default()
        }
    });
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(new);
    tracing::info!(?path, "settings reloaded from disk");
}
