//! Error types for the gateway.
//!
//! The taxonomy follows the request pipeline: requests are rejected with
//! [`GatewayError::Validation`] before anything is dispatched, backend failures
//! surface as [`GatewayError::Dispatch`], [`GatewayError::Timeout`] or
//! [`GatewayError::Streaming`] and are recovered by the fallback controller, and
//! only [`GatewayError::Terminal`] reaches the caller once every attempt failed.

use std::time::Duration;
use thiserror::Error;

/// Result alias used across the gateway crates
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Malformed or empty request, rejected before dispatch
    #[error("Validation error: {message}")]
    Validation {
        /// Human readable message
        message: String,
        /// Offending field, if known
        field: Option<String>,
        /// Machine readable code
        code: String,
    },

    /// Unknown provider key
    #[error("Provider not found: {provider}")]
    ProviderNotFound {
        /// Requested provider key
        provider: String,
    },

    /// The completion backend call raised
    #[error("Dispatch to '{model}' failed: {message}")]
    Dispatch {
        /// Model id the call was addressed to
        model: String,
        /// Cause reported by the backend or transport
        message: String,
        /// HTTP status, when the backend answered at all
        status_code: Option<u16>,
    },

    /// An attempt exceeded its deadline
    #[error("Request to '{model}' timed out after {timeout:?}")]
    Timeout {
        /// Model id the call was addressed to
        model: String,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// The chunk stream failed after it was opened
    #[error("Streaming error: {message}")]
    Streaming {
        /// Cause
        message: String,
    },

    /// A collaborator (model catalog, backend) is unreachable
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Cause
        message: String,
    },

    /// Both the streaming and the synchronous attempt failed
    #[error("{message}")]
    Terminal {
        /// Model id that was attempted
        model: String,
        /// Caller-facing message
        message: String,
        /// Why the synchronous call followed a stream attempt, if it did
        fallback_reason: Option<&'static str>,
    },

    /// The caller went away before the pipeline finished
    #[error("Client disconnected")]
    Cancelled,

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Cause
        message: String,
    },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    Internal {
        /// Cause
        message: String,
    },
}

impl GatewayError {
    /// Create a validation error
    pub fn validation(
        message: impl Into<String>,
        field: Option<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field,
            code: code.into(),
        }
    }

    /// Create a dispatch error
    pub fn dispatch(
        model: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Dispatch {
            model: model.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Create a timeout error
    pub fn timeout(model: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            model: model.into(),
            timeout,
        }
    }

    /// Create a streaming error
    pub fn streaming(message: impl Into<String>) -> Self {
        Self::Streaming {
            message: message.into(),
        }
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Create a provider not found error
    pub fn provider_not_found(provider: impl Into<String>) -> Self {
        Self::ProviderNotFound {
            provider: provider.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Build the caller-facing error raised once every attempt for `model` failed.
    ///
    /// The message names the model and the usual causes. `cause` is the last
    /// attempt's failure and must already be free of credentials.
    pub fn terminal(model: impl Into<String>, cause: impl AsRef<str>) -> Self {
        let model = model.into();
        let message = format!(
            "Error interacting with model {model}: {}\n\nCommon issues:\n\
             - Ensure the model id is correct (e.g. 'ollama/mistral', 'openrouter/openai/gpt-4o').\n\
             - For local models, make sure the model has been pulled on the inference daemon.\n\
             - Check that the completion backend is running and reachable.\n\
             - The model may not support the input type (e.g. images sent to a text-only model).",
            cause.as_ref()
        );
        Self::Terminal {
            model,
            message,
            fallback_reason: None,
        }
    }

    /// Mark a terminal error as reached through the stream-to-sync fallback
    #[must_use]
    pub fn after_fallback(mut self, reason: &'static str) -> Self {
        if let Self::Terminal {
            fallback_reason, ..
        } = &mut self
        {
            *fallback_reason = Some(reason);
        }
        self
    }

    /// Fallback reason carried by a terminal error
    #[must_use]
    pub fn fallback_reason(&self) -> Option<&'static str> {
        match self {
            Self::Terminal {
                fallback_reason, ..
            } => *fallback_reason,
            _ => None,
        }
    }

    /// HTTP status code this error maps to
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::ProviderNotFound { .. } => 404,
            Self::Dispatch { .. } | Self::Streaming { .. } | Self::Terminal { .. } => 502,
            Self::Timeout { .. } => 504,
            Self::ServiceUnavailable { .. } => 503,
            Self::Cancelled => 499,
            Self::Configuration { .. } | Self::Internal { .. } => 500,
        }
    }

    /// Short machine readable error type
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid_request_error",
            Self::ProviderNotFound { .. } => "not_found_error",
            Self::Dispatch { .. } => "dispatch_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Streaming { .. } => "stream_error",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Terminal { .. } => "upstream_error",
            Self::Cancelled => "cancelled",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Whether this error belongs to a single attempt and can be recovered by
    /// switching dispatch mode
    #[must_use]
    pub fn is_attempt_failure(&self) -> bool {
        matches!(
            self,
            Self::Dispatch { .. } | Self::Timeout { .. } | Self::Streaming { .. }
        )
    }
}
