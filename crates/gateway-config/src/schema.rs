//! Configuration schema.
//!
//! Every section has defaults, so an empty document is a complete
//! configuration. The provider table defaults to the local Ollama daemon plus
//! the hosted providers reachable through the completion proxy.

use gateway_core::ThinkingPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use validator::Validate;

use crate::ConfigError;

/// Root gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    /// HTTP listener
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    /// Completion backend
    #[serde(default)]
    #[validate(nested)]
    pub backend: BackendConfig,

    /// Stream-to-sync fallback
    #[serde(default)]
    #[validate(nested)]
    pub fallback: FallbackConfig,

    /// Provider table, in display order
    #[serde(default = "default_providers")]
    #[validate(nested)]
    pub providers: Vec<ProviderConfig>,

    /// Which models keep their reasoning markup
    #[serde(default)]
    pub thinking: ThinkingPolicy,

    /// Logging
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
            fallback: FallbackConfig::default(),
            providers: default_providers(),
            thinking: ThinkingPolicy::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl GatewayConfig {
    /// Validate field constraints and cross-field rules
    ///
    /// # Errors
    /// Returns the first violated constraint
    pub fn validate_all(&self) -> Result<(), ConfigError> {
        self.validate()?;

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.key.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate provider key '{}'",
                    provider.key
                )));
            }
            provider.models.check(&provider.key)?;
        }

        Ok(())
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    #[validate(length(min = 1))]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Capacity of the per-request delta channel
    #[serde(default = "default_channel_capacity")]
    #[validate(range(min = 1))]
    pub stream_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            stream_buffer: default_channel_capacity(),
        }
    }
}

impl ServerConfig {
    /// `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// OpenAI-compatible completion backend
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BackendConfig {
    /// Base URL; requests go to `{base_url}/chat/completions`
    #[serde(default = "default_backend_url")]
    #[validate(url)]
    pub base_url: String,

    /// Environment variable holding the bearer token, if any
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,

    /// Whether the backend can stream
    #[serde(default = "default_true")]
    pub streaming: bool,

    /// Connect timeout
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            api_key_env: default_api_key_env(),
            streaming: true,
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Stream-to-sync fallback settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FallbackConfig {
    /// Deadline for each dispatch attempt
    #[serde(default = "default_attempt_timeout", with = "humantime_serde")]
    pub attempt_timeout: Duration,

    /// Pause after each forwarded delta
    #[serde(default = "default_pacing_delay", with = "humantime_serde")]
    pub pacing_delay: Duration,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: default_attempt_timeout(),
            pacing_delay: default_pacing_delay(),
        }
    }
}

/// One provider entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProviderConfig {
    /// Provider key, e.g. `ollama`
    #[validate(length(min = 1))]
    pub key: String,

    /// Human readable name; derived from the key when absent
    #[serde(default)]
    pub display_name: Option<String>,

    /// Prefix prepended to bare model names, e.g. `ollama/`
    #[serde(default)]
    pub prefix: String,

    /// Where the model list comes from
    pub models: ModelSourceConfig,
}

impl ProviderConfig {
    /// Provider with a fixed model list
    pub fn fixed(key: &str, prefix: &str, models: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            display_name: None,
            prefix: prefix.to_string(),
            models: ModelSourceConfig::Static {
                models: models.iter().map(ToString::to_string).collect(),
            },
        }
    }

    /// Display name, explicit or derived from the key
    #[must_use]
    pub fn name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| display_name_for(&self.key))
    }
}

/// Model resolution strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSourceConfig {
    /// Fixed list
    Static {
        /// Bare model names
        models: Vec<String>,
    },
    /// Fetched from an Ollama daemon's tag listing
    Ollama {
        /// Daemon base URL
        #[serde(default = "default_ollama_url")]
        base_url: String,
        /// Served when the fetch fails or returns nothing
        #[serde(default)]
        fallback: Vec<String>,
        /// How long a fetched list is reused
        #[serde(default = "default_cache_ttl", with = "humantime_serde")]
        cache_ttl: Duration,
        /// Fetch timeout
        #[serde(default = "default_fetch_timeout", with = "humantime_serde")]
        timeout: Duration,
    },
}

impl ModelSourceConfig {
    fn check(&self, key: &str) -> Result<(), ConfigError> {
        match self {
            Self::Static { .. } => Ok(()),
            Self::Ollama { base_url, .. } => url::Url::parse(base_url).map(|_| ()).map_err(|e| {
                ConfigError::Validation(format!("provider '{key}': invalid base_url: {e}"))
            }),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Display name derived from a provider key
#[must_use]
pub fn display_name_for(key: &str) -> String {
    match key {
        "openrouter" => "OpenRouter".to_string(),
        "openai" => "OpenAI".to_string(),
        _ => {
            let mut chars = key.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        }
    }
}

/// Default provider table
#[must_use]
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            key: "ollama".to_string(),
            display_name: None,
            prefix: "ollama/".to_string(),
            models: ModelSourceConfig::Ollama {
                base_url: default_ollama_url(),
                fallback: [
                    "devstral:24b",
                    "llama3.3:70b",
                    "llama3.2:latest",
                    "qwen3:32b",
                    "qwq:32b",
                    "gemma3:27b",
                    "deepseek-r1:14b",
                    "qwen2.5vl:32b",
                ]
                .iter()
                .map(ToString::to_string)
                .collect(),
                cache_ttl: default_cache_ttl(),
                timeout: default_fetch_timeout(),
            },
        },
        ProviderConfig::fixed(
            "openrouter",
            "openrouter/",
            &[
                "openai/gpt-4o",
                "google/gemini-pro-1.5",
                "mistralai/mistral-large-latest",
                "anthropic/claude-3-opus",
                "nousresearch/nous-hermes-2-mixtral-8x7b-dpo",
                "meta-llama/llama-3-70b-instruct",
                "fireworks/firefunction-v1",
            ],
        ),
        ProviderConfig::fixed("openai", "", &["gpt-4", "gpt-4-turbo", "gpt-3.5-turbo", "gpt-4o"]),
        ProviderConfig::fixed(
            "groq",
            "groq/",
            &["llama3-8b-8192", "llama3-70b-8192", "mixtral-8x7b-32768", "gemma-7b-it"],
        ),
        ProviderConfig::fixed(
            "anthropic",
            "",
            &[
                "claude-3-opus-20240229",
                "claude-3-sonnet-20240229",
                "claude-3-haiku-20240307",
                "claude-2.1",
            ],
        ),
    ]
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_channel_capacity() -> usize {
    64
}

fn default_backend_url() -> String {
    "http://localhost:4000".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_api_key_env() -> Option<String> {
    Some("GATEWAY_BACKEND_API_KEY".to_string())
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_pacing_delay() -> Duration {
    Duration::from_millis(10)
}

/// Default Ollama daemon URL
#[must_use]
pub fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_log_level() -> String {
    "info".to_string()
}
