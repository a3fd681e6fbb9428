//! Message normalization.
//!
//! Turns the caller's shape-flexible history into the role/content list the
//! completion backend expects. The transform is pure and order preserving.

use crate::request::{ChatRequest, ContentPart, MessageContent, MessageRole, PartInput};
use serde::{Deserialize, Serialize};

/// Message in the completion backend's shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMessage {
    /// Role of the message author
    pub role: MessageRole,
    /// Normalized content
    pub content: CompletionContent,
}

/// Normalized content: text, or typed parts only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionContent {
    /// Plain text
    Text(String),
    /// Ordered parts
    Parts(Vec<ContentPart>),
}

/// Fully resolved request handed to the completion dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Fully-qualified model id
    pub model: String,
    /// Normalized messages
    pub messages: Vec<CompletionMessage>,
    /// Sampling temperature
    pub temperature: f32,
}

impl CompletionRequest {
    /// Create a completion request
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<CompletionMessage>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature,
        }
    }
}

/// Normalize a pre-validated request into backend messages.
///
/// A non-blank system prompt is prepended (trimmed). Text content passes through
/// unchanged. Parts map one to one; parts of unknown shape become text parts
/// holding their JSON representation.
#[must_use]
pub fn normalize(request: &ChatRequest) -> Vec<CompletionMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(prompt) = request.system_prompt.as_deref().map(str::trim) {
        if !prompt.is_empty() {
            messages.push(CompletionMessage {
                role: MessageRole::System,
                content: CompletionContent::Text(prompt.to_string()),
            });
        }
    }

    messages.extend(request.messages.iter().map(|message| CompletionMessage {
        role: message.role,
        content: normalize_content(&message.content),
    }));

    messages
}

fn normalize_content(content: &MessageContent) -> CompletionContent {
    match content {
        MessageContent::Text(text) => CompletionContent::Text(text.clone()),
        MessageContent::Parts(parts) => {
            CompletionContent::Parts(parts.iter().map(normalize_part).collect())
        }
    }
}

fn normalize_part(part: &PartInput) -> ContentPart {
    match part {
        PartInput::Part(known) => known.clone(),
        PartInput::Unknown(serde_json::Value::String(s)) => ContentPart::text(s.clone()),
        PartInput::Unknown(other) => {
            tracing::debug!(part = %other, "Carrying unrecognised content part as text");
            ContentPart::text(other.to_string())
        }
    }
}
