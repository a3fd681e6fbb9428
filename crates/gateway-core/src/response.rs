//! Response and streaming unit types.

use crate::request::MessageRole;
use serde::{Deserialize, Serialize};

/// Assistant message returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Always `assistant`
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

impl AssistantMessage {
    /// Create an assistant message
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Non-streaming chat response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Final, postprocessed answer
    pub message: AssistantMessage,
    /// Fully-qualified model id that produced it
    pub model: String,
}

impl ChatResponse {
    /// Create a response
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            message: AssistantMessage::new(content),
            model: model.into(),
        }
    }
}

/// One uniform text increment extracted from a backend chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDelta {
    /// Non-empty text
    pub text: String,
}

impl StreamDelta {
    /// Create a delta
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Streaming unit sent to the caller.
///
/// Serialized untagged:
/// `{"chunk","message"}`, `{"done":true,"message","model"}` or `{"error"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEvent {
    /// Terminal unit carrying the postprocessed full text
    Done {
        /// Always `true`
        done: bool,
        /// Final message
        message: AssistantMessage,
        /// Fully-qualified model id
        model: String,
    },
    /// Incremental text as it arrived from the backend
    Chunk {
        /// Delta text
        chunk: String,
        /// Same delta in message form
        message: AssistantMessage,
    },
    /// Terminal error
    Error {
        /// Caller-facing message
        error: String,
    },
}

impl StreamEvent {
    /// Chunk unit for a delta
    #[must_use]
    pub fn chunk(delta: &StreamDelta) -> Self {
        Self::Chunk {
            chunk: delta.text.clone(),
            message: AssistantMessage::new(delta.text.clone()),
        }
    }

    /// Terminal unit for the final answer
    pub fn done(full_text: impl Into<String>, model: impl Into<String>) -> Self {
        Self::Done {
            done: true,
            message: AssistantMessage::new(full_text),
            model: model.into(),
        }
    }

    /// Error unit
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Whether no further units follow this one
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_response_shape() {
        let json = serde_json::to_value(ChatResponse::new("Hello!", "ollama/llama3")).unwrap();
        assert_eq!(
            json,
            json!({"message": {"role": "assistant", "content": "Hello!"}, "model": "ollama/llama3"})
        );
    }

    #[test]
    fn test_stream_event_shapes() {
        let chunk = serde_json::to_value(StreamEvent::chunk(&StreamDelta::new("Hel"))).unwrap();
        assert_eq!(
            chunk,
            json!({"chunk": "Hel", "message": {"role": "assistant", "content": "Hel"}})
        );

        let done = serde_json::to_value(StreamEvent::done("Hello", "gpt-4")).unwrap();
        assert_eq!(done["done"], true);
        assert_eq!(done["message"]["content"], "Hello");
        assert_eq!(done["model"], "gpt-4");

        let err = serde_json::to_value(StreamEvent::error("boom")).unwrap();
        assert_eq!(err, json!({"error": "boom"}));
    }

    #[test]
    fn test_stream_event_parse_back() {
        let parsed: StreamEvent = serde_json::from_str(
            r#"{"done":true,"message":{"role":"assistant","content":"x"},"model":"m"}"#,
        )
        .unwrap();
        assert!(parsed.is_terminal());
        assert!(!StreamEvent::chunk(&StreamDelta::new("a")).is_terminal());
    }
}
