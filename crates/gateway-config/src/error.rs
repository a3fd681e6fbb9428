//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Error raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file extension is neither YAML nor TOML
    #[error("Unsupported config format for {path}: expected .yaml, .yml or .toml")]
    UnsupportedFormat {
        /// Offending file
        path: PathBuf,
    },

    /// The file did not parse
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// An environment override has an invalid value
    #[error("Invalid value for {var}: {message}")]
    Env {
        /// Variable name
        var: String,
        /// Cause
        message: String,
    },

    /// The parsed configuration violates a constraint
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<ConfigError> for gateway_core::GatewayError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration {
            message: e.to_string(),
        }
    }
}
