//! # Gateway Providers
//!
//! Provider registry and completion backend for the chat gateway.
//!
//! This crate provides:
//! - The provider registry with static and dynamically fetched model lists
//! - An Ollama model catalog with a TTL cache
//! - The completion backend trait and an OpenAI-compatible implementation
//! - The dispatcher, ordered text extractors and the stream adapter

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod dispatcher;
pub mod extract;
pub mod ollama;
pub mod openai_compat;
pub mod registry;
pub mod stream;

// Re-export main types
pub use backend::{ChunkStream, CompletionBackend};
pub use dispatcher::{CompletionDispatcher, DispatchMode, Dispatched};
pub use extract::{extract_text, Extractor, EXTRACTORS};
pub use ollama::OllamaModelSource;
pub use openai_compat::{OpenAICompatBackend, OpenAICompatConfig};
pub use registry::{
    ModelResolution, ModelSource, ProviderRegistry, ProviderSpec, ProviderSummary, ResolvedModels,
};
pub use stream::{StreamAdapter, StreamSummary};
