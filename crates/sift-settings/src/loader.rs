//! Settings loading: defaults → file → environment overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::Settings;

/// Default settings file location: `~/.sift/settings.json`.
#[must_use]
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".sift").join("settings.json")
}

/// Deep-merge `overlay` onto `base`. Objects merge recursively; any other
/// value in `overlay` replaces the one in `base`.
#[must_use]
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(host) = std::env::var("SIFT_HOST") {
        settings.server.host = host;
    }
    if let Ok(port) = std::env::var("SIFT_PORT") {
        if let Ok(port) = port.parse() {
            settings.server.port = port;
        }
    }
    if let Ok(db_path) = std::env::var("SIFT_DB_PATH") {
        settings.server.db_path = db_path;
    }
    if let Ok(tokens) = std::env::var("SIFT_DAILY_TOKENS") {
        if let Ok(tokens) = tokens.parse() {
            settings.budgets.daily_tokens = tokens;
        }
    }
    if let Ok(tokens) = std::env::var("SIFT_MONTHLY_TOKENS") {
        if let Ok(tokens) = tokens.parse() {
            settings.budgets.monthly_tokens = tokens;
        }
    }
    if let Ok(url) = std::env::var("SIFT_PRIMARY_BASE_URL") {
        settings.providers.primary.base_url = Some(url);
    }
    if let Ok(url) = std::env::var("SIFT_FALLBACK_BASE_URL") {
        settings.providers.fallback.base_url = Some(url);
    }
    if let Ok(runs) = std::env::var("SIFT_MAX_CONCURRENT_RUNS") {
        if let Ok(runs) = runs.parse() {
            settings.pipeline.max_concurrent_runs = runs;
        }
    }
}

/// Load settings from a specific path, merging over defaults and applying
/// env overrides. A missing file is not an error — defaults apply.
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    let defaults = serde_json::to_value(Settings::default())?;

    let merged = if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let overlay: Value = serde_json::from_str(&raw)?;
        debug!(?path, "loaded settings file");
        deep_merge(defaults, overlay)
    } else {
        debug!(?path, "no settings file, using defaults");
        defaults
    };

    let mut settings: Settings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Load settings from the default location.
pub fn load_settings() -> Result<Settings> {
    load_settings_from_path(&settings_path())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
