//! Completion dispatcher.
//!
//! Issues a fully resolved request to the completion backend in the requested
//! mode. Backend failures surface as attempt errors; recovering from them is
//! the fallback controller's job.

use gateway_core::{CompletionRequest, GatewayError, GatewayResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::backend::{ChunkStream, CompletionBackend};
use crate::extract::extract_text;

/// How to call the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Incremental chunks
    Streaming,
    /// One complete response
    Synchronous,
}

/// What the backend handed back
pub enum Dispatched {
    /// Whole response payload
    Raw(Value),
    /// Chunk stream
    Stream(ChunkStream),
}

impl std::fmt::Debug for Dispatched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw(value) => f.debug_tuple("Raw").field(value).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Dispatcher over a shared completion backend
#[derive(Clone)]
pub struct CompletionDispatcher {
    backend: Arc<dyn CompletionBackend>,
}

impl CompletionDispatcher {
    /// Create a dispatcher
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Whether the backend can stream
    #[must_use]
    pub fn supports_streaming(&self) -> bool {
        self.backend.supports_streaming()
    }

    /// Backend name
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Dispatch in the given mode
    ///
    /// # Errors
    /// Returns a dispatch error when the backend call fails
    #[instrument(skip(self, request), fields(model = %request.model, messages = request.messages.len()))]
    pub async fn dispatch(
        &self,
        request: &CompletionRequest,
        mode: DispatchMode,
    ) -> GatewayResult<Dispatched> {
        debug!(?mode, backend = self.backend.name(), "Dispatching completion");

        let result = match mode {
            DispatchMode::Streaming => self.backend.complete_stream(request).await.map(Dispatched::Stream),
            DispatchMode::Synchronous => self.backend.complete(request).await.map(Dispatched::Raw),
        };

        result.map_err(|e| as_attempt_failure(&request.model, e))
    }

    /// Synchronous dispatch reduced to its extracted text
    ///
    /// # Errors
    /// Returns a dispatch error when the backend call fails
    pub async fn complete(&self, request: &CompletionRequest) -> GatewayResult<String> {
        match self.dispatch(request, DispatchMode::Synchronous).await? {
            Dispatched::Raw(value) => Ok(extract_text(&value)),
            Dispatched::Stream(_) => Err(GatewayError::internal("synchronous dispatch returned a stream")),
        }
    }

    /// Streaming dispatch
    ///
    /// # Errors
    /// Returns a dispatch error when the stream cannot be opened
    pub async fn stream(&self, request: &CompletionRequest) -> GatewayResult<ChunkStream> {
        match self.dispatch(request, DispatchMode::Streaming).await? {
            Dispatched::Stream(stream) => Ok(stream),
            Dispatched::Raw(_) => Err(GatewayError::internal("streaming dispatch returned a payload")),
        }
    }
}

fn as_attempt_failure(model: &str, error: GatewayError) -> GatewayError {
    if error.is_attempt_failure() {
        error
    } else {
        GatewayError::dispatch(model, error.to_string(), None)
    }
}
