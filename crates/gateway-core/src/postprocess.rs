//! Reasoning-tag postprocessing.
//!
//! Models emit reasoning markup (`<think>`, `<reasoning>`, `<answer>`). For
//! ordinary models that markup is removed; for models classified as thinking
//! models it is rewritten into labeled sections so the reasoning stays visible.
//! Both branches collapse runs of blank lines and trim the result.
//!
//! Span removal is non-greedy and requires a closing tag: an opening tag with no
//! matching close is left in the text as-is.

use crate::types::bare_model_name;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static THINK_SPAN: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<think>.*?</think>"));
static REASONING_SPAN: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<reasoning>.*?</reasoning>"));
static ANSWER_MARKER: Lazy<Regex> = Lazy::new(|| compile(r"</?answer>"));
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| compile(r"\n{3,}"));

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

/// Section header for `<think>`
pub const THINKING_LABEL: &str = "💭 *Thinking:*";
/// Section header for `<reasoning>`
pub const REASONING_LABEL: &str = "💡 *Reasoning:*";
/// Section header for `<answer>`
pub const ANSWER_LABEL: &str = "✅ *Answer:*";

/// Classification of a model by how its reasoning markup is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelClass {
    /// Reasoning markup is reformatted and kept
    Thinking,
    /// Reasoning markup is stripped
    Standard,
}

/// Which models count as thinking models.
///
/// A bare model name is a thinking model when its lowercase form contains one of
/// `keywords` or one of `models`, so quantized or distilled tags of a listed
/// model match too. Both lists are configuration data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingPolicy {
    /// Case-insensitive substrings
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    /// Bare model names, matched as case-insensitive substrings
    #[serde(default = "default_models")]
    pub models: Vec<String>,
}

fn default_keywords() -> Vec<String> {
    vec!["think".to_string(), "reasoning".to_string(), "cot".to_string()]
}

fn default_models() -> Vec<String> {
    vec!["deepseek-r1:14b".to_string(), "deepseek-r1:8b".to_string()]
}

impl Default for ThinkingPolicy {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            models: default_models(),
        }
    }
}

impl ThinkingPolicy {
    /// Create a policy from keyword and model lists
    #[must_use]
    pub fn new(keywords: Vec<String>, models: Vec<String>) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            models: models.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    /// Classify a model id (qualified or bare)
    #[must_use]
    pub fn classify(&self, model_id: &str) -> ModelClass {
        let bare = bare_model_name(model_id).to_lowercase();

        let keyword_hit = self
            .keywords
            .iter()
            .any(|k| !k.is_empty() && bare.contains(&k.to_lowercase()));
        let listed = self
            .models
            .iter()
            .any(|m| !m.is_empty() && bare.contains(&m.to_lowercase()));

        if keyword_hit || listed {
            ModelClass::Thinking
        } else {
            ModelClass::Standard
        }
    }
}

/// Postprocessor applied to every final answer
#[derive(Debug, Clone, Default)]
pub struct TagPostprocessor {
    policy: ThinkingPolicy,
}

impl TagPostprocessor {
    /// Create a postprocessor with the given policy
    #[must_use]
    pub fn new(policy: ThinkingPolicy) -> Self {
        Self { policy }
    }

    /// The classification policy in use
    #[must_use]
    pub fn policy(&self) -> &ThinkingPolicy {
        &self.policy
    }

    /// Classify a model id
    #[must_use]
    pub fn classify(&self, model_id: &str) -> ModelClass {
        self.policy.classify(model_id)
    }

    /// Produce display text from raw model output.
    ///
    /// Deterministic, and idempotent on text free of the recognised tags.
    #[must_use]
    pub fn process(&self, raw: &str, model_id: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }

        let shaped = match self.classify(model_id) {
            ModelClass::Thinking => format_sections(raw),
            ModelClass::Standard => strip_markup(raw),
        };

        EXCESS_NEWLINES
            .replace_all(&shaped, "\n\n")
            .trim()
            .to_string()
    }
}

fn strip_markup(text: &str) -> String {
    let without_think = THINK_SPAN.replace_all(text, "");
    let without_answer = ANSWER_MARKER.replace_all(&without_think, "");
    REASONING_SPAN.replace_all(&without_answer, "").into_owned()
}

fn format_sections(text: &str) -> String {
    text.replace("<think>", &format!("\n\n{THINKING_LABEL}\n\n"))
        .replace("</think>", "\n\n")
        .replace("<reasoning>", &format!("\n\n{REASONING_LABEL}\n\n"))
        .replace("</reasoning>", "\n\n")
        .replace("<answer>", &format!("\n\n{ANSWER_LABEL}\n\n"))
        .replace("</answer>", "")
}
