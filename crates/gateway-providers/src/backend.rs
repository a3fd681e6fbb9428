//! Completion backend abstraction.

use async_trait::async_trait;
use futures::stream::BoxStream;
use gateway_core::{CompletionRequest, GatewayResult};
use serde_json::Value;

/// Finite, non-restartable stream of raw backend chunks
pub type ChunkStream = BoxStream<'static, GatewayResult<Value>>;

/// A service that runs chat completions for fully-qualified model ids.
///
/// Payloads are returned raw; text extraction happens downstream so that
/// backends with different response shapes can share one pipeline.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Whether [`CompletionBackend::complete_stream`] is usable
    fn supports_streaming(&self) -> bool;

    /// Run a completion and return the whole response payload
    async fn complete(&self, request: &CompletionRequest) -> GatewayResult<Value>;

    /// Run a completion and return its chunk stream
    async fn complete_stream(&self, request: &CompletionRequest) -> GatewayResult<ChunkStream>;
}
