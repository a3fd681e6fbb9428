//! Shared application state.

use gateway_config::GatewayConfig;
use gateway_core::{GatewayError, GatewayResult, TagPostprocessor};
use gateway_providers::{
    CompletionBackend, CompletionDispatcher, OpenAICompatBackend, OpenAICompatConfig,
    ProviderRegistry,
};
use gateway_resilience::{ControllerConfig, FallbackController};
use gateway_telemetry::Metrics;
use std::sync::Arc;
use tracing::info;

use crate::chat::ChatService;

/// State shared by every handler
#[derive(Clone, Debug)]
pub struct AppState {
    /// Gateway configuration
    pub config: Arc<GatewayConfig>,
    /// Provider registry
    pub registry: Arc<ProviderRegistry>,
    /// Chat pipeline
    pub chat: ChatService,
    /// Metrics
    pub metrics: Metrics,
}

impl AppState {
    /// Create a new builder
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }
}

/// Builder for [`AppState`].
///
/// Anything not supplied is built from the configuration: the registry from
/// `providers`, the backend from `backend`, and a fresh metrics registry.
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<GatewayConfig>,
    registry: Option<ProviderRegistry>,
    backend: Option<Arc<dyn CompletionBackend>>,
    metrics: Option<Metrics>,
}

impl AppStateBuilder {
    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a prebuilt provider registry
    #[must_use]
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use a specific completion backend
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use an existing metrics instance
    #[must_use]
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the state
    ///
    /// # Errors
    /// Returns an error when the registry, backend or metrics cannot be created
    pub fn build(self) -> GatewayResult<AppState> {
        let config = self.config.unwrap_or_default();

        let registry = match self.registry {
            Some(registry) => registry,
            None => ProviderRegistry::from_config(&config.providers)?,
        };

        let backend: Arc<dyn CompletionBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(OpenAICompatBackend::new(OpenAICompatConfig::from_settings(
                &config.backend,
            ))?),
        };

        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Metrics::new()
                .map_err(|e| GatewayError::internal(format!("failed to register metrics: {e}")))?,
        };

        let dispatcher = CompletionDispatcher::new(backend);
        let backend_name = dispatcher.backend_name().to_string();
        let controller = FallbackController::new(
            dispatcher,
            TagPostprocessor::new(config.thinking.clone()),
            ControllerConfig::from(&config.fallback),
        );

        let thinking = controller.postprocessor().policy();
        info!(
            providers = registry.len(),
            backend = %backend_name,
            backend_url = %config.backend.base_url,
            attempt_timeout_secs = controller.config().attempt_timeout.as_secs(),
            thinking_keywords = thinking.keywords.len(),
            thinking_models = thinking.models.len(),
            "Application state ready"
        );

        let registry = Arc::new(registry);
        Ok(AppState {
            chat: ChatService::new(Arc::clone(&registry), controller, metrics.clone()),
            config: Arc::new(config),
            registry,
            metrics,
        })
    }
}
