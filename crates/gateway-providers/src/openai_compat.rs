//! OpenAI-compatible completion backend.
//!
//! Talks to an aggregation proxy exposing `POST {base_url}/chat/completions`
//! (LiteLLM and similar), which routes `provider/model` ids to the real
//! provider. Streaming uses server-sent events terminated by `[DONE]` or by the
//! end of the response body.

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use gateway_config::BackendConfig;
use gateway_core::{CompletionMessage, CompletionRequest, GatewayError, GatewayResult};
use reqwest::{Client, RequestBuilder};
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

use crate::backend::{ChunkStream, CompletionBackend};

/// Configuration for [`OpenAICompatBackend`]
#[derive(Debug, Clone)]
pub struct OpenAICompatConfig {
    /// Proxy base URL
    pub base_url: String,
    /// Bearer token
    pub api_key: Option<SecretString>,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Whether the proxy streams
    pub streaming: bool,
}

impl OpenAICompatConfig {
    /// Create a configuration for `base_url` with streaming enabled
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            connect_timeout: Duration::from_secs(10),
            streaming: true,
        }
    }

    /// Set the bearer token
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(key.into()));
        self
    }

    /// Enable or disable streaming
    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build from gateway configuration, reading the key from the configured variable
    #[must_use]
    pub fn from_settings(settings: &BackendConfig) -> Self {
        let mut config = Self::new(settings.base_url.clone())
            .with_streaming(settings.streaming)
            .with_connect_timeout(settings.connect_timeout);

        if let Some(key) = settings
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
        {
            config = config.with_api_key(key);
        }
        config
    }
}

/// Completion backend for OpenAI-compatible proxies
pub struct OpenAICompatBackend {
    config: OpenAICompatConfig,
    client: Client,
}

impl OpenAICompatBackend {
    /// Create a backend
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created
    pub fn new(config: OpenAICompatConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> RequestBuilder {
        let body = WireRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            stream,
        };

        let builder = self
            .client
            .post(self.completions_url())
            .header("Content-Type", "application/json")
            .json(&body);

        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAICompatBackend {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn supports_streaming(&self) -> bool {
        self.config.streaming
    }

    async fn complete(&self, request: &CompletionRequest) -> GatewayResult<Value> {
        debug!(model = %request.model, url = %self.completions_url(), "Sending completion request");

        let response = self
            .build_request(request, false)
            .send()
            .await
            .map_err(|e| GatewayError::dispatch(&request.model, format!("Request failed: {e}"), None))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(model = %request.model, status = %status, "Completion backend returned an error");
            return Err(GatewayError::dispatch(
                &request.model,
                format!("backend returned {status}: {body}"),
                Some(status.as_u16()),
            ));
        }

        response.json::<Value>().await.map_err(|e| {
            GatewayError::dispatch(&request.model, format!("Failed to parse response: {e}"), None)
        })
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> GatewayResult<ChunkStream> {
        if !self.config.streaming {
            return Err(GatewayError::dispatch(
                &request.model,
                "streaming is disabled for this backend",
                None,
            ));
        }

        debug!(model = %request.model, "Starting streaming completion");

        let event_source = EventSource::new(self.build_request(request, true)).map_err(|e| {
            GatewayError::dispatch(&request.model, format!("Failed to create event source: {e}"), None)
        })?;
        let model = request.model.clone();

        let stream = try_stream! {
            let mut es = event_source;

            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => {
                        trace!(model = %model, "Completion stream opened");
                    }
                    Ok(Event::Message(msg)) => {
                        let data = msg.data.trim();
                        if data == "[DONE]" {
                            break;
                        }
                        match serde_json::from_str::<Value>(data) {
                            Ok(chunk) => yield chunk,
                            Err(e) => {
                                warn!(error = %e, data = %data, "Undecodable stream chunk");
                                yield Value::Null;
                            }
                        }
                    }
                    Err(EventSourceError::StreamEnded) => break,
                    Err(EventSourceError::InvalidStatusCode(status, response)) => {
                        let body = response.text().await.unwrap_or_default();
                        es.close();
                        Err(GatewayError::dispatch(
                            &model,
                            format!("backend returned {status}: {body}"),
                            Some(status.as_u16()),
                        ))?;
                    }
                    Err(e) => {
                        error!(model = %model, error = %e, "Completion stream error");
                        es.close();
                        Err(GatewayError::streaming(format!("Stream error: {e}")))?;
                    }
                }
            }

            es.close();
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [CompletionMessage],
    temperature: f32,
    stream: bool,
}
