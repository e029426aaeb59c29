//! Settings type definitions.
//!
//! Every field carries a serde default so a partial settings file merges
//! cleanly over the compiled defaults. Wire casing is `camelCase`.

use serde::{Deserialize, Serialize};

/// Root settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Provider endpoints.
    pub providers: ProviderSettings,
    /// Token budget limits.
    pub budgets: BudgetSettings,
    /// Response cache settings.
    pub cache: CacheSettings,
    /// Pipeline execution settings.
    pub pipeline: PipelineSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Path to the `SQLite` database file.
    pub db_path: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8460,
            db_path: "sift.db".into(),
        }
    }
}

/// One provider endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderEndpoint {
    /// Model identifier.
    pub model: String,
    /// Endpoint override; `None` uses the provider's public endpoint.
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Per-request deadline in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderEndpoint {
    fn default() -> Self {
        Self {
            model: String::new(),
            base_url: None,
            api_key_env: String::new(),
            timeout_secs: 120,
        }
    }
}

/// Primary and fallback provider endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    /// Primary provider (Anthropic-style).
    pub primary: ProviderEndpoint,
    /// Fallback provider (OpenAI-compatible).
    pub fallback: ProviderEndpoint,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            primary: ProviderEndpoint {
                model: "claude-sonnet-4-5".into(),
                base_url: None,
                api_key_env: "ANTHROPIC_API_KEY".into(),
                timeout_secs: 120,
            },
            fallback: ProviderEndpoint {
                model: "gpt-4o-mini".into(),
                base_url: None,
                api_key_env: "OPENAI_API_KEY".into(),
                timeout_secs: 120,
            },
        }
    }
}

/// Token budget limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BudgetSettings {
    /// Per-tenant daily token budget (per-call gate).
    pub daily_tokens: u64,
    /// Per-tenant monthly token budget (run admission gate).
    pub monthly_tokens: u64,
    /// Output token ceiling per step.
    pub max_step_tokens: u32,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            daily_tokens: 1_000_000,
            monthly_tokens: 20_000_000,
            max_step_tokens: 4096,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Response TTL in hours.
    pub ttl_hours: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_hours: 24 }
    }
}

/// Pipeline execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Concurrent-run ceiling.
    pub max_concurrent_runs: usize,
    /// Per-run event channel capacity.
    pub event_channel_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 8,
            event_channel_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_fills_in_defaults() {
        let parsed: Settings =
            serde_json::from_str(r#"{"server": {"port": 9000}}"#).unwrap();
        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.server.host, "127.0.0.1");
        assert_eq!(parsed.budgets.daily_tokens, 1_000_000);
    }

    #[test]
    fn camel_case_wire_casing() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert!(json["budgets"].get("dailyTokens").is_some());
        assert!(json["pipeline"].get("maxConcurrentRuns").is_some());
        assert!(json["providers"]["primary"].get("apiKeyEnv").is_some());
    }

    #[test]
    fn round_trip() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings, back);
    }
}
