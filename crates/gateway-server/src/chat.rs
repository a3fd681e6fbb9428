//! Chat pipeline.
//!
//! Validation, normalization and model qualification happen up front so a
//! malformed request is rejected before anything is dispatched. The prepared
//! request then goes through the fallback controller, and the outcome is
//! recorded in metrics.

use gateway_core::{
    normalize, ChatRequest, ChatResponse, CompletionRequest, GatewayError, GatewayResult,
    StreamEvent,
};
use gateway_providers::ProviderRegistry;
use gateway_resilience::{DiscardSink, FallbackController, FallbackOutcome, FallbackResult};
use gateway_telemetry::{ChatMode, ChatOutcome, Metrics};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Runs chat requests end to end
#[derive(Clone)]
pub struct ChatService {
    registry: Arc<ProviderRegistry>,
    controller: FallbackController,
    metrics: Metrics,
}

impl ChatService {
    /// Create a service
    pub fn new(registry: Arc<ProviderRegistry>, controller: FallbackController, metrics: Metrics) -> Self {
        Self {
            registry,
            controller,
            metrics,
        }
    }

    /// Validate and translate a caller request into a backend request
    ///
    /// # Errors
    /// `Validation` for malformed input, `ProviderNotFound` for an unknown provider key
    pub fn prepare(&self, request: &ChatRequest) -> GatewayResult<CompletionRequest> {
        request.validate()?;

        let model = self
            .registry
            .fully_qualified(&request.model, request.provider.as_deref())?;
        let messages = normalize(request);
        debug!(model = %model, messages = messages.len(), "Prepared completion request");

        Ok(CompletionRequest::new(model, messages, request.temperature))
    }

    /// Answer a request without streaming
    ///
    /// # Errors
    /// Any preparation error, or `Terminal` when the backend produced no answer
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn complete(&self, request: &ChatRequest) -> GatewayResult<ChatResponse> {
        let started = Instant::now();

        let prepared = match self.prepare(request) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.record_failure(ChatMode::Sync, &e, started);
                return Err(e);
            }
        };

        match self.controller.run(&prepared, false, &DiscardSink).await {
            Ok(result) => {
                self.record_success(ChatMode::Sync, &result, started);
                Ok(ChatResponse::new(result.text, prepared.model))
            }
            Err(e) => {
                self.record_failure(ChatMode::Sync, &e, started);
                Err(e)
            }
        }
    }

    /// Stream an already prepared request into `events`.
    ///
    /// Chunk units are sent as deltas arrive; exactly one terminal unit
    /// (done or error) follows unless the receiver has gone away.
    #[instrument(skip(self, prepared, events), fields(model = %prepared.model))]
    pub async fn stream(&self, prepared: CompletionRequest, events: mpsc::Sender<StreamEvent>) {
        let started = Instant::now();

        match self.controller.run(&prepared, true, &events).await {
            Ok(result) => {
                self.record_success(ChatMode::Stream, &result, started);
                if events.send(StreamEvent::done(result.text, prepared.model)).await.is_err() {
                    debug!("Caller went away before the final unit");
                }
            }
            Err(GatewayError::Cancelled) => {
                info!("Stream cancelled by caller");
                self.metrics
                    .record_chat(ChatMode::Stream, ChatOutcome::Cancelled, started.elapsed());
            }
            Err(e) => {
                self.record_failure(ChatMode::Stream, &e, started);
                if events.send(StreamEvent::error(e.to_string())).await.is_err() {
                    debug!("Caller went away before the error unit");
                }
            }
        }
    }

    /// Send the error unit for a request that failed preparation
    pub async fn reject(&self, error: &GatewayError, events: &mpsc::Sender<StreamEvent>) {
        self.metrics
            .record_chat(ChatMode::Stream, ChatOutcome::Error, std::time::Duration::ZERO);
        if events.send(StreamEvent::error(error.to_string())).await.is_err() {
            debug!("Caller went away before the error unit");
        }
    }

    fn record_success(&self, mode: ChatMode, result: &FallbackResult, started: Instant) {
        if let Some(summary) = &result.stream_summary {
            self.metrics
                .record_stream_chunks(summary.chunks_seen, summary.empty_chunks());
        }

        let stream_reason = result
            .outcomes
            .first()
            .filter(|first| !first.is_success())
            .and_then(FallbackOutcome::fallback_reason);
        let outcome = match stream_reason {
            Some(reason) if result.degraded() => {
                self.metrics.record_fallback(reason);
                ChatOutcome::Degraded
            }
            _ => ChatOutcome::Success,
        };

        let elapsed = started.elapsed();
        info!(
            ?outcome,
            streamed = result.streamed(),
            elapsed_ms = elapsed.as_millis(),
            "Chat request answered"
        );
        self.metrics.record_chat(mode, outcome, elapsed);
    }

    fn record_failure(&self, mode: ChatMode, error: &GatewayError, started: Instant) {
        warn!(error_type = error.error_type(), error = %error, "Chat request failed");
        if let Some(reason) = error.fallback_reason() {
            self.metrics.record_fallback(reason);
        }
        self.metrics.record_chat(mode, ChatOutcome::Error, started.elapsed());
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("providers", &self.registry.len())
            .finish_non_exhaustive()
    }
}
