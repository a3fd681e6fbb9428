//! # Gateway Telemetry
//!
//! Observability for the chat gateway.
//!
//! This crate provides:
//! - Structured logging through `tracing-subscriber`
//! - Prometheus metrics for the chat pipeline

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod metrics;

// Re-export main types
pub use logging::{init_logging, LoggingConfig, LoggingError};
pub use metrics::{ChatMode, ChatOutcome, Metrics};
