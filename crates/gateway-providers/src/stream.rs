//! Stream adapter.
//!
//! Turns raw backend chunks into uniform text deltas while keeping the counts
//! the fallback controller needs to judge the stream afterwards.

use gateway_core::StreamDelta;
use serde_json::Value;
use tracing::trace;

use crate::extract::extract_text;

/// What a consumed stream produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Chunks received, empty or not
    pub chunks_seen: usize,
    /// Chunks that carried text
    pub non_empty_chunks: usize,
    /// Concatenated delta text in arrival order
    pub accumulated_text: String,
}

impl StreamSummary {
    /// Chunks that carried no text
    #[must_use]
    pub fn empty_chunks(&self) -> usize {
        self.chunks_seen - self.non_empty_chunks
    }
}

/// Incremental chunk consumer
#[derive(Debug, Default)]
pub struct StreamAdapter {
    summary: StreamSummary,
}

impl StreamAdapter {
    /// Create an adapter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk, returning its delta when it carried text
    pub fn ingest(&mut self, chunk: &Value) -> Option<StreamDelta> {
        self.summary.chunks_seen += 1;

        let text = extract_text(chunk);
        if text.is_empty() {
            trace!(chunk = self.summary.chunks_seen, "Skipping empty chunk");
            return None;
        }

        self.summary.non_empty_chunks += 1;
        self.summary.accumulated_text.push_str(&text);
        Some(StreamDelta::new(text))
    }

    /// Counts so far
    #[must_use]
    pub fn summary(&self) -> &StreamSummary {
        &self.summary
    }

    /// Finish and hand back the summary
    #[must_use]
    pub fn finish(self) -> StreamSummary {
        self.summary
    }
}
