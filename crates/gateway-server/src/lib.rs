//! # Gateway Server
//!
//! HTTP server implementation for the chat gateway.
//!
//! This crate provides:
//! - Axum-based HTTP server with provider, model and chat endpoints
//! - Server-sent events and WebSocket streaming of chat responses
//! - The chat pipeline tying normalization, dispatch and fallback together
//! - Health and Prometheus metrics endpoints
//! - Graceful shutdown on Ctrl-C / SIGTERM

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chat;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use chat::ChatService;
pub use error::ApiError;
pub use routes::create_router;
pub use server::{Server, ServerError};
pub use state::{AppState, AppStateBuilder};
