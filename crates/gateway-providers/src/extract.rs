//! Text extraction from heterogeneous backend payloads.
//!
//! Backends disagree on where the text lives in a response or chunk. The
//! extractors below are tried in order; the first one that finds a present,
//! non-null value decides the result, even when that value is empty.

use serde_json::Value;

/// A path lookup into a backend payload
pub type Extractor = fn(&Value) -> Option<&Value>;

fn first_choice(value: &Value) -> Option<&Value> {
    value.get("choices")?.get(0)
}

fn delta_content(v: &Value) -> Option<&Value> {
    first_choice(v)?.get("delta")?.get("content")
}

fn delta_text(v: &Value) -> Option<&Value> {
    first_choice(v)?.get("delta")?.get("text")
}

fn choice_text(v: &Value) -> Option<&Value> {
    first_choice(v)?.get("text")
}

fn message_content(v: &Value) -> Option<&Value> {
    first_choice(v)?.get("message")?.get("content")
}

fn top_level_content(v: &Value) -> Option<&Value> {
    v.get("content")
}

fn top_level_text(v: &Value) -> Option<&Value> {
    v.get("text")
}

/// Extractors in priority order, with the path each one reads
pub const EXTRACTORS: &[(&str, Extractor)] = &[
    ("choices[0].delta.content", delta_content),
    ("choices[0].delta.text", delta_text),
    ("choices[0].text", choice_text),
    ("choices[0].message.content", message_content),
    ("content", top_level_content),
    ("text", top_level_text),
];

/// Extract the text of a response or chunk; empty when nothing matches
#[must_use]
pub fn extract_text(payload: &Value) -> String {
    EXTRACTORS
        .iter()
        .find_map(|(_, extractor)| extractor(payload).filter(|v| !v.is_null()))
        .map(value_text)
        .unwrap_or_default()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().filter_map(element_text).collect(),
        Value::Object(_) => element_text(value).unwrap_or_default(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
    }
}

fn element_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("text").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
