//! Request types for the gateway.
//!
//! Callers send a provider-qualified (or bare) model id together with a
//! conversation whose messages are either plain text or a list of typed parts.

use crate::error::GatewayError;
use crate::types::{Temperature, DEFAULT_TEMPERATURE};
use serde::{Deserialize, Serialize};

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Chat request accepted by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Target model, provider-qualified (e.g. "ollama/llama3") or bare
    pub model: String,

    /// Conversation history, oldest first
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    /// Optional system prompt prepended to the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Sampling temperature (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Stream the response incrementally
    #[serde(default)]
    pub stream: bool,

    /// Provider key; when present the model is qualified with the provider's prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ChatRequest {
    /// Create a new builder for `ChatRequest`
    #[must_use]
    pub fn builder() -> ChatRequestBuilder {
        ChatRequestBuilder::default()
    }

    /// Get validated temperature
    ///
    /// # Errors
    /// Returns error if temperature is out of range
    pub fn validated_temperature(&self) -> Result<Temperature, GatewayError> {
        Temperature::new(self.temperature)
    }

    /// Whether a non-blank system prompt is present
    #[must_use]
    pub fn has_system_prompt(&self) -> bool {
        self.system_prompt
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
    }

    /// Validate the entire request
    ///
    /// # Errors
    /// Returns error if any field is invalid
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.model.trim().is_empty() {
            return Err(GatewayError::validation(
                "model is required",
                Some("model".to_string()),
                "missing_model",
            ));
        }

        if self.messages.is_empty() && !self.has_system_prompt() {
            return Err(GatewayError::validation(
                "request needs at least one message or a system prompt",
                Some("messages".to_string()),
                "empty_messages",
            ));
        }

        self.validated_temperature()?;

        if let Some(provider) = &self.provider {
            if provider.trim().is_empty() {
                return Err(GatewayError::validation(
                    "provider must not be blank",
                    Some("provider".to_string()),
                    "invalid_provider",
                ));
            }
        }

        for (index, message) in self.messages.iter().enumerate() {
            if let MessageContent::Parts(parts) = &message.content {
                let empty_image = parts.iter().any(|part| {
                    matches!(
                        part,
                        PartInput::Part(ContentPart::ImageUrl { image_url }) if image_url.url.trim().is_empty()
                    )
                });
                if empty_image {
                    return Err(GatewayError::validation(
                        format!("messages[{index}] contains an image part with an empty url"),
                        Some(format!("messages[{index}].content")),
                        "empty_image_url",
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Builder for `ChatRequest`
#[derive(Debug, Default)]
pub struct ChatRequestBuilder {
    model: Option<String>,
    messages: Vec<ChatMessage>,
    system_prompt: Option<String>,
    temperature: Option<f32>,
    stream: bool,
    provider: Option<String>,
}

impl ChatRequestBuilder {
    /// Set the model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a message
    #[must_use]
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the messages
    #[must_use]
    pub fn messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Enable streaming
    #[must_use]
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set the provider key
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Build the request
    ///
    /// # Errors
    /// Returns error if required fields are missing or invalid
    pub fn build(self) -> Result<ChatRequest, GatewayError> {
        let model = self.model.ok_or_else(|| {
            GatewayError::validation("model is required", Some("model".to_string()), "missing_model")
        })?;

        let request = ChatRequest {
            model,
            messages: self.messages,
            system_prompt: self.system_prompt,
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            stream: self.stream,
            provider: self.provider,
        };

        request.validate()?;

        Ok(request)
    }
}

/// Chat message with role and content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author
    pub role: MessageRole,

    /// Content of the message
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message from parts
    #[must_use]
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Parts(parts.into_iter().map(PartInput::Part).collect()),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Message content (text or multimodal parts)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Multimodal content parts, in caller order
    Parts(Vec<PartInput>),
}

impl MessageContent {
    /// Get as text if this is a text content
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Parts(_) => None,
        }
    }
}

/// A content part as received from the caller.
///
/// Parts whose shape is not recognised are kept as raw JSON so the normalizer
/// can carry them forward instead of dropping the turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartInput {
    /// A recognised part
    Part(ContentPart),
    /// Anything else
    Unknown(serde_json::Value),
}

/// Content part for multimodal messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content part
    Text {
        /// The text content
        text: String,
    },
    /// Image content part
    ImageUrl {
        /// Image URL details
        image_url: ImageUrl,
    },
}

impl ContentPart {
    /// Create a text part
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an image part from a URL or data URI
    #[must_use]
    pub fn image(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// Image reference, usually a `data:<media type>;base64,<bytes>` URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// URL of the image
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ChatRequest::builder()
            .model("ollama/llama3")
            .message(ChatMessage::user("Hello"))
            .temperature(0.2)
            .build()
            .expect("should build");

        assert_eq!(request.model, "ollama/llama3");
        assert_eq!(request.messages.len(), 1);
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
        assert!(!request.stream);
    }

    #[test]
    fn test_request_builder_missing_model() {
        let request = ChatRequest::builder()
            .message(ChatMessage::user("Hello"))
            .build();

        assert!(request.is_err());
    }

    #[test]
    fn test_system_prompt_alone_is_enough() {
        let request = ChatRequest::builder()
            .model("gpt-4")
            .system_prompt("You are terse")
            .build();
        assert!(request.is_ok());

        let blank = ChatRequest::builder()
            .model("gpt-4")
            .system_prompt("   ")
            .build();
        assert!(matches!(blank, Err(GatewayError::Validation { ref code, .. }) if code == "empty_messages"));
    }

    #[test]
    fn test_request_validation_invalid_temperature() {
        let request = ChatRequest::builder()
            .model("gpt-4")
            .message(ChatMessage::user("Hello"))
            .temperature(3.0)
            .build();

        assert!(request.is_err());
    }

    #[test]
    fn test_empty_image_url_rejected() {
        let request = ChatRequest::builder()
            .model("ollama/llava")
            .message(ChatMessage::user_parts(vec![ContentPart::image("")]))
            .build();

        assert!(matches!(request, Err(GatewayError::Validation { ref code, .. }) if code == "empty_image_url"));
    }

    #[test]
    fn test_defaults_from_json() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"model":"ollama/llama3","messages":[{"role":"user","content":"hi"}]}"#,
        )
        .expect("valid json");

        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
        assert!(!request.stream);
        assert!(request.system_prompt.is_none());
        assert_eq!(request.messages[0].content.as_text(), Some("hi"));
    }

    #[test]
    fn test_mixed_parts_deserialize() {
        let message: ChatMessage = serde_json::from_str(
            r#"{"role":"user","content":[
                {"type":"text","text":"what is this?"},
                {"type":"image_url","image_url":{"url":"data:image/jpeg;base64,AAAA"}},
                {"type":"audio","data":"zzz"}
            ]}"#,
        )
        .expect("valid json");

        let MessageContent::Parts(parts) = message.content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(parts[0], PartInput::Part(ContentPart::Text { .. })));
        assert!(matches!(parts[1], PartInput::Part(ContentPart::ImageUrl { .. })));
        assert!(matches!(parts[2], PartInput::Unknown(_)));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result = serde_json::from_str::<ChatMessage>(r#"{"role":"","content":"x"}"#);
        assert!(result.is_err());
    }
}
