//! Ollama model catalog.
//!
//! Lists locally pulled models via `GET {base_url}/api/tags`. Results are cached
//! for a TTL; the cache is swapped atomically so concurrent readers never block
//! and the last successful fetch wins.

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use gateway_core::{GatewayError, GatewayResult};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::registry::ModelSource;

#[derive(Debug)]
struct CachedModels {
    models: Vec<String>,
    fetched_at: Instant,
}

/// Model source backed by an Ollama daemon
pub struct OllamaModelSource {
    base_url: String,
    client: Client,
    cache_ttl: Duration,
    cache: ArcSwapOption<CachedModels>,
}

impl OllamaModelSource {
    /// Create a source for the daemon at `base_url`
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created
    pub fn new(base_url: &str, cache_ttl: Duration, timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            cache_ttl,
            cache: ArcSwapOption::empty(),
        })
    }

    fn cached(&self) -> Option<Vec<String>> {
        let guard = self.cache.load();
        let entry = guard.as_ref()?;
        (entry.fetched_at.elapsed() < self.cache_ttl).then(|| entry.models.clone())
    }

    async fn fetch_tags(&self) -> GatewayResult<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        debug!(url = %url, "Fetching Ollama model tags");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::service_unavailable(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(GatewayError::service_unavailable(format!(
                "Ollama returned {status}"
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::service_unavailable(format!("Invalid Ollama response: {e}")))?;

        Ok(tags
            .models
            .into_iter()
            .filter_map(|entry| entry.name.or(entry.model))
            .filter(|name| !name.is_empty())
            .collect())
    }
}

#[async_trait]
impl ModelSource for OllamaModelSource {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn fetch_models(&self, force_refresh: bool) -> GatewayResult<Vec<String>> {
        if !force_refresh {
            if let Some(models) = self.cached() {
                debug!(count = models.len(), "Serving cached Ollama models");
                return Ok(models);
            }
        }

        match self.fetch_tags().await {
            Ok(models) => {
                info!(count = models.len(), "Fetched Ollama models");
                self.cache.store(Some(Arc::new(CachedModels {
                    models: models.clone(),
                    fetched_at: Instant::now(),
                })));
                Ok(models)
            }
            Err(e) => {
                warn!(base_url = %self.base_url, error = %e, "Ollama model fetch failed");
                Err(e)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<String>,
}
