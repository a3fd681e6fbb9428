//! # Gateway Core
//!
//! Core types, transforms, and error handling for the chat gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Request types and validation
//! - Message normalization into the completion backend's shape
//! - Response and streaming wire units
//! - Reasoning-tag postprocessing and model classification
//! - Error types and handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod normalize;
pub mod postprocess;
pub mod request;
pub mod response;
pub mod types;

// Re-export commonly used types
pub use error::{GatewayError, GatewayResult};
pub use normalize::{normalize, CompletionContent, CompletionMessage, CompletionRequest};
pub use postprocess::{ModelClass, TagPostprocessor, ThinkingPolicy};
pub use request::{ChatMessage, ChatRequest, ContentPart, ImageUrl, MessageContent, MessageRole, PartInput};
pub use response::{AssistantMessage, ChatResponse, StreamDelta, StreamEvent};
pub use types::{bare_model_name, Temperature, DEFAULT_TEMPERATURE};
