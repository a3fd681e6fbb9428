//! # LLM Chat Gateway
//!
//! Multi-provider chat gateway with streaming and a synchronous fallback.
//!
//! ## Features
//!
//! - Provider registry with static and dynamically fetched model lists
//! - Streaming over server-sent events and WebSocket
//! - One-shot fallback from streaming to a synchronous call
//! - Reasoning-tag postprocessing for thinking models
//! - Prometheus metrics and structured logging
//!
//! ## Usage
//!
//! ```bash
//! # Start with default configuration
//! llm-chat-gateway
//!
//! # Start with a config file
//! GATEWAY_CONFIG=/path/to/config.yaml llm-chat-gateway
//!
//! # Start with environment overrides
//! GATEWAY_PORT=9000 OLLAMA_HOST=gpu-box:11434 llm-chat-gateway
//! ```

use gateway_config::{load_config, GatewayConfig, LogFormat};
use gateway_server::{AppState, Server};
use gateway_telemetry::{init_logging, LoggingConfig};
use tracing::{error, info};

/// Application entry point
#[tokio::main]
async fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let logging = LoggingConfig::new(config.logging.level.clone())
        .with_json(config.logging.format == LogFormat::Json);
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting LLM Chat Gateway"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "Application failed");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        host = %config.server.host,
        port = config.server.port,
        backend = %config.backend.base_url,
        providers = config.providers.len(),
        "Configuration loaded"
    );

    let state = AppState::builder().config(config).build()?;

    Server::new(state).run().await?;

    Ok(())
}
