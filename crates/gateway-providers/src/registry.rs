//! Provider registry.
//!
//! Maps a provider key to how its model list is resolved and to the prefix the
//! completion backend expects in front of bare model names. Built once at
//! startup and shared behind an `Arc`; the only mutable state lives inside the
//! dynamic model sources.

use async_trait::async_trait;
use gateway_config::{ModelSourceConfig, ProviderConfig};
use gateway_core::{GatewayError, GatewayResult};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ollama::OllamaModelSource;

/// A catalog that can list models at runtime
#[async_trait]
pub trait ModelSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &str;

    /// Fetch the current model list, bypassing any cache when `force_refresh`
    async fn fetch_models(&self, force_refresh: bool) -> GatewayResult<Vec<String>>;
}

/// How a provider's models are resolved
#[derive(Clone)]
pub enum ModelResolution {
    /// Fixed list
    Static(Vec<String>),
    /// Fetched at runtime; `fallback` is served when the fetch fails or is empty
    Dynamic {
        /// Runtime catalog
        source: Arc<dyn ModelSource>,
        /// Configured fallback list
        fallback: Vec<String>,
    },
}

impl std::fmt::Debug for ModelResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(models) => f.debug_tuple("Static").field(models).finish(),
            Self::Dynamic { source, fallback } => f
                .debug_struct("Dynamic")
                .field("source", &source.name())
                .field("fallback", fallback)
                .finish(),
        }
    }
}

/// One registered provider
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    /// Provider key
    pub key: String,
    /// Human readable name
    pub display_name: String,
    /// Model resolution strategy
    pub resolution: ModelResolution,
    /// Prefix used to address the completion backend
    pub prefix: String,
}

impl ProviderSpec {
    /// Provider with a fixed model list
    pub fn fixed(
        key: impl Into<String>,
        prefix: impl Into<String>,
        models: Vec<String>,
    ) -> Self {
        let key = key.into();
        Self {
            display_name: gateway_config::display_name_for(&key),
            key,
            resolution: ModelResolution::Static(models),
            prefix: prefix.into(),
        }
    }

    /// Provider whose models come from a runtime catalog
    pub fn dynamic(
        key: impl Into<String>,
        prefix: impl Into<String>,
        source: Arc<dyn ModelSource>,
        fallback: Vec<String>,
    ) -> Self {
        let key = key.into();
        Self {
            display_name: gateway_config::display_name_for(&key),
            key,
            resolution: ModelResolution::Dynamic { source, fallback },
            prefix: prefix.into(),
        }
    }

    /// Override the display name
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Prepend the prefix unless the model already carries it
    #[must_use]
    pub fn qualify(&self, bare: &str) -> String {
        if self.prefix.is_empty() || bare.starts_with(&self.prefix) {
            bare.to_string()
        } else {
            format!("{}{bare}", self.prefix)
        }
    }
}

/// Entry in the provider listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
    /// Provider key
    pub id: String,
    /// Display name
    pub name: String,
}

/// Result of resolving a provider's models
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModels {
    /// Bare model names
    pub models: Vec<String>,
    /// Whether the configured fallback list was served
    pub used_fallback: bool,
    /// Why the dynamic fetch did not produce the list, if it failed
    pub fetch_error: Option<String>,
}

/// Registry of configured providers, in configuration order
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<ProviderSpec>,
    index: HashMap<String, usize>,
}

impl ProviderRegistry {
    /// Build a registry from provider specs
    ///
    /// # Errors
    /// Returns a configuration error on duplicate keys
    pub fn new(providers: Vec<ProviderSpec>) -> GatewayResult<Self> {
        let mut index = HashMap::with_capacity(providers.len());
        for (position, spec) in providers.iter().enumerate() {
            if index.insert(spec.key.clone(), position).is_some() {
                return Err(GatewayError::Configuration {
                    message: format!("duplicate provider key '{}'", spec.key),
                });
            }
        }
        Ok(Self { providers, index })
    }

    /// Build a registry from configuration
    ///
    /// # Errors
    /// Returns an error when a catalog client cannot be created or keys repeat
    pub fn from_config(configs: &[ProviderConfig]) -> GatewayResult<Self> {
        let specs = configs
            .iter()
            .map(|config| {
                let spec = match &config.models {
                    ModelSourceConfig::Static { models } => {
                        ProviderSpec::fixed(&config.key, &config.prefix, models.clone())
                    }
                    ModelSourceConfig::Ollama {
                        base_url,
                        fallback,
                        cache_ttl,
                        timeout,
                    } => ProviderSpec::dynamic(
                        &config.key,
                        &config.prefix,
                        Arc::new(OllamaModelSource::new(base_url, *cache_ttl, *timeout)?),
                        fallback.clone(),
                    ),
                };
                Ok(spec.with_display_name(config.name()))
            })
            .collect::<GatewayResult<Vec<_>>>()?;

        Self::new(specs)
    }

    /// Number of providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Look up a provider
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ProviderSpec> {
        self.index.get(key).map(|&i| &self.providers[i])
    }

    fn require(&self, key: &str) -> GatewayResult<&ProviderSpec> {
        self.get(key)
            .ok_or_else(|| GatewayError::provider_not_found(key))
    }

    /// Providers in configuration order
    #[must_use]
    pub fn list_providers(&self) -> Vec<ProviderSummary> {
        self.providers
            .iter()
            .map(|spec| ProviderSummary {
                id: spec.key.clone(),
                name: spec.display_name.clone(),
            })
            .collect()
    }

    /// Resolve the model list for a provider.
    ///
    /// A failed or empty dynamic fetch is not fatal: the configured fallback
    /// is served and flagged. Only a failed fetch with no fallback is an error.
    ///
    /// # Errors
    /// `ProviderNotFound` for an unknown key; `ServiceUnavailable` when the
    /// catalog is unreachable and no fallback is configured
    pub async fn resolve(&self, key: &str, force_refresh: bool) -> GatewayResult<ResolvedModels> {
        let spec = self.require(key)?;

        match &spec.resolution {
            ModelResolution::Static(models) => Ok(ResolvedModels {
                models: models.clone(),
                used_fallback: false,
                fetch_error: None,
            }),
            ModelResolution::Dynamic { source, fallback } => {
                match source.fetch_models(force_refresh).await {
                    Ok(models) if !models.is_empty() => {
                        debug!(provider = %key, count = models.len(), "Resolved models dynamically");
                        Ok(ResolvedModels {
                            models,
                            used_fallback: false,
                            fetch_error: None,
                        })
                    }
                    Ok(_) => {
                        warn!(provider = %key, source = source.name(), "Catalog returned no models, serving fallback");
                        Ok(ResolvedModels {
                            models: fallback.clone(),
                            used_fallback: !fallback.is_empty(),
                            fetch_error: None,
                        })
                    }
                    Err(e) if fallback.is_empty() => {
                        warn!(provider = %key, error = %e, "Catalog unreachable and no fallback configured");
                        Err(GatewayError::service_unavailable(format!(
                            "model catalog for provider '{key}' is unreachable: {e}"
                        )))
                    }
                    Err(e) => {
                        warn!(provider = %key, error = %e, "Catalog unreachable, serving fallback");
                        Ok(ResolvedModels {
                            models: fallback.clone(),
                            used_fallback: true,
                            fetch_error: Some(e.to_string()),
                        })
                    }
                }
            }
        }
    }

    /// Qualify a bare model name for the completion backend
    ///
    /// # Errors
    /// `ProviderNotFound` for an unknown key
    pub fn qualify(&self, key: &str, bare: &str) -> GatewayResult<String> {
        Ok(self.require(key)?.qualify(bare))
    }

    /// Model id to dispatch: qualified when a provider is named, verbatim otherwise
    ///
    /// # Errors
    /// `ProviderNotFound` when the named provider is unknown
    pub fn fully_qualified(&self, model: &str, provider: Option<&str>) -> GatewayResult<String> {
        match provider {
            Some(key) => self.qualify(key, model),
            None => Ok(model.to_string()),
        }
    }
}
