//! Prometheus metrics for the chat pipeline.
//!
//! Each [`Metrics`] owns its registry so that independent instances (tests,
//! embedded servers) never collide on metric names.

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;
use tracing::error;

/// How a chat request was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// Plain JSON response
    Sync,
    /// Server-sent events or WebSocket
    Stream,
}

impl ChatMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Stream => "stream",
        }
    }
}

/// How a chat request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Answered on the first attempt
    Success,
    /// Answered by the synchronous fallback
    Degraded,
    /// Rejected or failed
    Error,
    /// Caller went away
    Cancelled,
}

impl ChatOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Degraded => "degraded",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Gateway metrics
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    chat_requests: IntCounterVec,
    fallbacks: IntCounterVec,
    stream_chunks: IntCounterVec,
    catalog_fallbacks: IntCounterVec,
    request_duration: HistogramVec,
}

impl Metrics {
    /// Create and register all metrics
    ///
    /// # Errors
    /// Returns error if a metric cannot be registered
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let chat_requests = IntCounterVec::new(
            Opts::new("chat_requests_total", "Chat requests by mode and outcome"),
            &["mode", "outcome"],
        )?;
        let fallbacks = IntCounterVec::new(
            Opts::new(
                "chat_fallbacks_total",
                "Stream attempts degraded to a synchronous call",
            ),
            &["reason"],
        )?;
        let stream_chunks = IntCounterVec::new(
            Opts::new("chat_stream_chunks_total", "Backend stream chunks received"),
            &["kind"],
        )?;
        let catalog_fallbacks = IntCounterVec::new(
            Opts::new(
                "model_catalog_fallbacks_total",
                "Model listings served from the configured fallback",
            ),
            &["provider"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new("chat_request_duration_seconds", "Chat request latency")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["mode"],
        )?;

        registry.register(Box::new(chat_requests.clone()))?;
        registry.register(Box::new(fallbacks.clone()))?;
        registry.register(Box::new(stream_chunks.clone()))?;
        registry.register(Box::new(catalog_fallbacks.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            chat_requests,
            fallbacks,
            stream_chunks,
            catalog_fallbacks,
            request_duration,
        })
    }

    /// Record a finished chat request
    pub fn record_chat(&self, mode: ChatMode, outcome: ChatOutcome, elapsed: Duration) {
        self.chat_requests
            .with_label_values(&[mode.as_str(), outcome.as_str()])
            .inc();
        self.request_duration
            .with_label_values(&[mode.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    /// Record a stream-to-sync fallback
    pub fn record_fallback(&self, reason: &str) {
        self.fallbacks.with_label_values(&[reason]).inc();
    }

    /// Record stream chunk counts
    pub fn record_stream_chunks(&self, seen: usize, empty: usize) {
        self.stream_chunks
            .with_label_values(&["seen"])
            .inc_by(seen as u64);
        self.stream_chunks
            .with_label_values(&["empty"])
            .inc_by(empty as u64);
    }

    /// Record a model listing served from fallback
    pub fn record_catalog_fallback(&self, provider: &str) {
        self.catalog_fallbacks.with_label_values(&[provider]).inc();
    }

    /// Prometheus text exposition of every metric
    #[must_use]
    pub fn gather(&self) -> String {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to encode metrics");
                String::new()
            })
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}
