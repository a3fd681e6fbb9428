//! Configuration loading.
//!
//! Resolution order: built-in defaults, then the file named by
//! `GATEWAY_CONFIG` (YAML or TOML by extension), then environment overrides.

use std::path::Path;
use tracing::{debug, info};

use crate::{ConfigError, GatewayConfig, ModelSourceConfig};

/// Variable naming the configuration file
pub const CONFIG_PATH_VAR: &str = "GATEWAY_CONFIG";

/// Load, override and validate the configuration from the process environment
///
/// # Errors
/// Returns an error when the file cannot be read or parsed, an override is
/// malformed, or the result fails validation
pub fn load_config() -> Result<GatewayConfig, ConfigError> {
    load_with(|var| std::env::var(var).ok())
}

/// [`load_config`] with an explicit variable lookup
///
/// # Errors
/// See [`load_config`]
pub fn load_with<F>(lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup(CONFIG_PATH_VAR) {
        Some(path) if !path.trim().is_empty() => load_from_path(Path::new(path.trim()))?,
        _ => {
            debug!("No config file given, using defaults");
            GatewayConfig::default()
        }
    };

    apply_env_overrides(&mut config, &lookup)?;
    config.validate_all()?;
    Ok(config)
}

/// Parse a configuration file without validating it
///
/// # Errors
/// Returns an error when the file cannot be read, has an unknown extension, or
/// does not parse
pub fn load_from_path(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&contents)?,
        Some("toml") => toml::from_str(&contents)?,
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    info!(path = %path.display(), "Loaded configuration file");
    Ok(config)
}

/// Apply `GATEWAY_*` and `OLLAMA_HOST` overrides
///
/// # Errors
/// Returns an error when a numeric override does not parse
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("GATEWAY_HOST") {
        config.server.host = host;
    }

    if let Some(port) = lookup("GATEWAY_PORT") {
        config.server.port = port.trim().parse().map_err(|e| ConfigError::Env {
            var: "GATEWAY_PORT".to_string(),
            message: format!("{e}"),
        })?;
    }

    if let Some(url) = lookup("GATEWAY_BACKEND_URL") {
        config.backend.base_url = url;
    }

    if let Some(level) = lookup("GATEWAY_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Some(host) = lookup("OLLAMA_HOST") {
        let url = with_scheme(host.trim());
        for provider in &mut config.providers {
            if let ModelSourceConfig::Ollama { base_url, .. } = &mut provider.models {
                base_url.clone_from(&url);
            }
        }
    }

    Ok(())
}

fn with_scheme(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("http://{}", host.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    fn temp_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_with(env(&[])).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.providers.len(), 5);
    }

    #[test]
    fn test_yaml_file() {
        let file = temp_file(
            ".yaml",
            r#"
server:
  port: 9000
fallback:
  attempt_timeout: 30s
  pacing_delay: 0s
providers:
  - key: ollama
    prefix: "ollama/"
    models:
      type: ollama
      fallback: ["llama3"]
  - key: local
    display_name: Local vLLM
    models:
      type: static
      models: ["qwen"]
thinking:
  keywords: ["ponder"]
  models: []
"#,
        );
        let path = file.path().to_string_lossy().to_string();
        let config = load_with(env(&[(CONFIG_PATH_VAR, &path)])).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.fallback.attempt_timeout, Duration::from_secs(30));
        assert_eq!(config.fallback.pacing_delay, Duration::ZERO);
        assert_eq!(config.providers[1].name(), "Local vLLM");
        assert_eq!(config.thinking.keywords, ["ponder"]);
        let ModelSourceConfig::Ollama { base_url, .. } = &config.providers[0].models else {
            panic!("expected ollama source");
        };
        assert_eq!(base_url, "http://localhost:11434");
    }

    #[test]
    fn test_toml_file() {
        let file = temp_file(
            ".toml",
            r#"
[backend]
base_url = "http://proxy:4000"
streaming = false

[logging]
level = "debug"
format = "json"
"#,
        );
        let config = load_from_path(file.path()).unwrap();
        assert_eq!(config.backend.base_url, "http://proxy:4000");
        assert!(!config.backend.streaming);
        assert_eq!(config.logging.format, crate::LogFormat::Json);
    }

    #[test]
    fn test_unknown_extension() {
        let file = temp_file(".ini", "x=1");
        assert!(matches!(
            load_from_path(file.path()),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = load_with(env(&[
            ("GATEWAY_HOST", "127.0.0.1"),
            ("GATEWAY_PORT", "8080"),
            ("GATEWAY_BACKEND_URL", "http://litellm:4000"),
            ("GATEWAY_LOG_LEVEL", "debug"),
            ("OLLAMA_HOST", "gpu-box:11434/"),
        ]))
        .unwrap();

        assert_eq!(config.server.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.backend.base_url, "http://litellm:4000");
        assert_eq!(config.logging.level, "debug");
        let ModelSourceConfig::Ollama { base_url, .. } = &config.providers[0].models else {
            panic!("expected ollama source");
        };
        assert_eq!(base_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_bad_port_override() {
        let err = load_with(env(&[("GATEWAY_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "GATEWAY_PORT"));
    }
}
