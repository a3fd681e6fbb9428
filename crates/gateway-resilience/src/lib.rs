//! # Gateway Resilience
//!
//! Recovery for the chat gateway's completion pipeline:
//! - Stream attempt with per-attempt deadlines
//! - One-shot degradation from streaming to a synchronous call
//! - Caller-side delta sinks that observe disconnects

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fallback;
pub mod sink;

// Re-export main types
pub use fallback::{ControllerConfig, FallbackController, FallbackOutcome, FallbackResult};
pub use sink::{DeltaSink, DiscardSink, SinkClosed};
