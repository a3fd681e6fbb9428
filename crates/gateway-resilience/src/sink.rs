//! Caller-side delta sinks.

use async_trait::async_trait;
use gateway_core::{StreamDelta, StreamEvent};
use tokio::sync::mpsc;

/// The caller stopped listening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Receiver of forwarded deltas
#[async_trait]
pub trait DeltaSink: Send + Sync {
    /// Forward one delta, waiting for capacity
    async fn send_delta(&self, delta: StreamDelta) -> Result<(), SinkClosed>;

    /// Whether the receiving side has gone away
    fn is_closed(&self) -> bool {
        false
    }
}

/// Sink that drops every delta
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

#[async_trait]
impl DeltaSink for DiscardSink {
    async fn send_delta(&self, _delta: StreamDelta) -> Result<(), SinkClosed> {
        Ok(())
    }
}

#[async_trait]
impl DeltaSink for mpsc::Sender<StreamDelta> {
    async fn send_delta(&self, delta: StreamDelta) -> Result<(), SinkClosed> {
        self.send(delta).await.map_err(|_| SinkClosed)
    }

    fn is_closed(&self) -> bool {
        mpsc::Sender::is_closed(self)
    }
}

#[async_trait]
impl DeltaSink for mpsc::Sender<StreamEvent> {
    async fn send_delta(&self, delta: StreamDelta) -> Result<(), SinkClosed> {
        self.send(StreamEvent::chunk(&delta)).await.map_err(|_| SinkClosed)
    }

    fn is_closed(&self) -> bool {
        mpsc::Sender::is_closed(self)
    }
}
