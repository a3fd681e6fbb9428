//! # Gateway Config
//!
//! Configuration for the chat gateway: listener, completion backend, fallback
//! timing, the provider table, thinking-model policy and logging.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::{apply_env_overrides, load_config, load_from_path, load_with, CONFIG_PATH_VAR};
pub use schema::{
    default_ollama_url, default_providers, display_name_for, BackendConfig, FallbackConfig,
    GatewayConfig, LogFormat, LoggingSettings, ModelSourceConfig, ProviderConfig, ServerConfig,
};
