//! Stream-to-synchronous fallback.
//!
//! A request that asks for streaming is first dispatched as a stream. Deltas
//! are forwarded to the caller as they arrive. If the stream cannot be opened,
//! breaks, times out, or yields nothing displayable, the request is dispatched
//! once more synchronously with identical parameters. A request never costs
//! more than two dispatch calls, and the caller always ends with either a
//! final answer or a terminal error.

use futures_util::StreamExt;
use gateway_core::{CompletionRequest, GatewayError, GatewayResult, TagPostprocessor};
use gateway_providers::{CompletionDispatcher, StreamAdapter, StreamSummary};
use std::time::Duration;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{debug, info, instrument, warn};

use crate::sink::DeltaSink;

/// Timing for [`FallbackController`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Deadline for each dispatch attempt
    pub attempt_timeout: Duration,
    /// Pause after each forwarded delta
    pub pacing_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(120),
            pacing_delay: Duration::from_millis(10),
        }
    }
}

impl From<&gateway_config::FallbackConfig> for ControllerConfig {
    fn from(config: &gateway_config::FallbackConfig) -> Self {
        Self {
            attempt_timeout: config.attempt_timeout,
            pacing_delay: config.pacing_delay,
        }
    }
}

/// How one attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// The stream produced displayable text
    StreamedOk {
        /// Raw accumulated text
        full_text: String,
    },
    /// The stream ended without displayable text
    StreamedEmpty,
    /// The stream could not be opened, broke, or timed out
    StreamFailed {
        /// Cause
        cause: String,
    },
    /// The synchronous call produced displayable text
    NonStreamedOk {
        /// Raw response text
        full_text: String,
    },
    /// The synchronous call failed or produced nothing displayable
    NonStreamedFailed {
        /// Cause
        cause: String,
    },
}

impl FallbackOutcome {
    /// Whether this outcome ends the request successfully
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::StreamedOk { .. } | Self::NonStreamedOk { .. })
    }

    /// Metric label for a stream attempt that handed over to the synchronous call
    #[must_use]
    pub fn fallback_reason(&self) -> Option<&'static str> {
        match self {
            Self::StreamedEmpty => Some("empty"),
            Self::StreamFailed { .. } => Some("failed"),
            _ => None,
        }
    }
}

/// Final answer of a controller run
#[derive(Debug, Clone)]
pub struct FallbackResult {
    /// Postprocessed text shown to the caller
    pub text: String,
    /// Raw text before postprocessing
    pub raw_text: String,
    /// Attempt outcomes in order
    pub outcomes: Vec<FallbackOutcome>,
    /// Stream counts, when a stream was consumed
    pub stream_summary: Option<StreamSummary>,
}

impl FallbackResult {
    /// Whether the synchronous fallback produced the answer after a stream attempt
    #[must_use]
    pub fn degraded(&self) -> bool {
        self.outcomes.len() > 1
    }

    /// Whether the answer came from a stream
    #[must_use]
    pub fn streamed(&self) -> bool {
        matches!(self.outcomes.last(), Some(FallbackOutcome::StreamedOk { .. }))
    }
}

enum StreamAttempt {
    Displayable { raw: String, display: String },
    Empty,
}

/// Runs the stream-then-sync state machine for one request
#[derive(Clone)]
pub struct FallbackController {
    dispatcher: CompletionDispatcher,
    postprocessor: TagPostprocessor,
    config: ControllerConfig,
}

impl FallbackController {
    /// Create a controller
    pub fn new(
        dispatcher: CompletionDispatcher,
        postprocessor: TagPostprocessor,
        config: ControllerConfig,
    ) -> Self {
        Self {
            dispatcher,
            postprocessor,
            config,
        }
    }

    /// Timing in use
    #[must_use]
    pub fn config(&self) -> ControllerConfig {
        self.config
    }

    /// Postprocessor in use
    #[must_use]
    pub fn postprocessor(&self) -> &TagPostprocessor {
        &self.postprocessor
    }

    /// Produce the final answer for `request`.
    ///
    /// With `stream` set and a streaming-capable backend, deltas go to `sink`
    /// while the stream is read; otherwise `sink` is never used.
    ///
    /// # Errors
    /// `Terminal` when the synchronous attempt fails, `Cancelled` when the sink
    /// closes while the stream is being read
    #[instrument(skip(self, request, sink), fields(model = %request.model))]
    pub async fn run<S>(
        &self,
        request: &CompletionRequest,
        stream: bool,
        sink: &S,
    ) -> GatewayResult<FallbackResult>
    where
        S: DeltaSink + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(2);
        let mut stream_summary = None;

        if stream && self.dispatcher.supports_streaming() {
            let mut adapter = StreamAdapter::new();
            let attempt = self.stream_attempt(request, sink, &mut adapter).await;
            let summary = adapter.finish();
            debug!(
                chunks_seen = summary.chunks_seen,
                non_empty_chunks = summary.non_empty_chunks,
                "Stream attempt finished"
            );

            match attempt {
                Ok(StreamAttempt::Displayable { raw, display }) => {
                    outcomes.push(FallbackOutcome::StreamedOk {
                        full_text: raw.clone(),
                    });
                    return Ok(FallbackResult {
                        text: display,
                        raw_text: raw,
                        outcomes,
                        stream_summary: Some(summary),
                    });
                }
                Ok(StreamAttempt::Empty) => {
                    info!(chunks_seen = summary.chunks_seen, "Stream produced no content, falling back to synchronous call");
                    outcomes.push(FallbackOutcome::StreamedEmpty);
                }
                Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
                Err(e) => {
                    warn!(error = %e, "Stream attempt failed, falling back to synchronous call");
                    outcomes.push(FallbackOutcome::StreamFailed {
                        cause: e.to_string(),
                    });
                }
            }
            stream_summary = Some(summary);

            if sink.is_closed() {
                return Err(GatewayError::Cancelled);
            }
        }

        match self.sync_attempt(request).await {
            Ok((raw, display)) => {
                outcomes.push(FallbackOutcome::NonStreamedOk {
                    full_text: raw.clone(),
                });
                Ok(FallbackResult {
                    text: display,
                    raw_text: raw,
                    outcomes,
                    stream_summary,
                })
            }
            Err(e) => {
                let sync_cause = e.to_string();
                let stream_outcome = outcomes.first().cloned();
                outcomes.push(FallbackOutcome::NonStreamedFailed {
                    cause: sync_cause.clone(),
                });
                warn!(error = %sync_cause, ?outcomes, "Synchronous attempt failed");

                let terminal = match &stream_outcome {
                    Some(FallbackOutcome::StreamFailed { cause }) => GatewayError::terminal(
                        &request.model,
                        format!("{sync_cause} (streaming attempt failed first: {cause})"),
                    ),
                    Some(FallbackOutcome::StreamedEmpty) => GatewayError::terminal(
                        &request.model,
                        format!("{sync_cause} (streaming attempt returned no content)"),
                    ),
                    _ => GatewayError::terminal(&request.model, sync_cause),
                };
                match stream_outcome.as_ref().and_then(FallbackOutcome::fallback_reason) {
                    Some(reason) => Err(terminal.after_fallback(reason)),
                    None => Err(terminal),
                }
            }
        }
    }

    async fn stream_attempt<S>(
        &self,
        request: &CompletionRequest,
        sink: &S,
        adapter: &mut StreamAdapter,
    ) -> GatewayResult<StreamAttempt>
    where
        S: DeltaSink + ?Sized,
    {
        let deadline = Instant::now() + self.config.attempt_timeout;
        let timed_out = || GatewayError::timeout(&request.model, self.config.attempt_timeout);

        let mut chunks = timeout_at(deadline, self.dispatcher.stream(request))
            .await
            .map_err(|_| timed_out())??;

        while let Some(chunk) = timeout_at(deadline, chunks.next()).await.map_err(|_| timed_out())? {
            let Some(delta) = adapter.ingest(&chunk?) else {
                continue;
            };

            if sink.send_delta(delta).await.is_err() {
                debug!("Caller went away, releasing stream");
                return Err(GatewayError::Cancelled);
            }

            if !self.config.pacing_delay.is_zero() {
                sleep(self.config.pacing_delay).await;
            }
        }

        let summary = adapter.summary();
        if summary.chunks_seen == 0 || summary.non_empty_chunks == 0 {
            return Ok(StreamAttempt::Empty);
        }

        let display = self.postprocessor.process(&summary.accumulated_text, &request.model);
        if display.trim().is_empty() {
            return Ok(StreamAttempt::Empty);
        }

        Ok(StreamAttempt::Displayable {
            raw: summary.accumulated_text.clone(),
            display,
        })
    }

    async fn sync_attempt(&self, request: &CompletionRequest) -> GatewayResult<(String, String)> {
        let raw = timeout(self.config.attempt_timeout, self.dispatcher.complete(request))
            .await
            .map_err(|_| GatewayError::timeout(&request.model, self.config.attempt_timeout))??;

        let display = self.postprocessor.process(&raw, &request.model);
        if display.trim().is_empty() {
            return Err(GatewayError::dispatch(
                &request.model,
                "no content in response",
                None,
            ));
        }

        Ok((raw, display))
    }
}
