use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chat::ChatMessage;
use crate::field::Field;

/// Chat-completion request body, as accepted from callers and as forwarded upstream.
///
/// Only the keys below are relayed; anything else in the caller's body is dropped.
/// Optional keys are [`Field`]s so a key the caller left out stays out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequestBody {
    /// Model ID used to generate the response.
    pub model: String,
    /// The conversation so far. May be empty; upstream decides whether that is valid.
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub max_tokens: Field<i64>,
    /// Tool definitions, passed through untouched.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub tools: Field<JsonValue>,
    /// `"auto" | "none" | "any" | "required" | {...}`, passed through untouched.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub tool_choice: Field<JsonValue>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub stream: Field<bool>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub top_p: Field<f64>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub temperature: Field<f64>,
}

impl ChatCompletionRequestBody {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: Field::Absent,
            tools: Field::Absent,
            tool_choice: Field::Absent,
            stream: Field::Absent,
            top_p: Field::Absent,
            temperature: Field::Absent,
        }
    }

    /// Streaming only when the caller sent `"stream": true`.
    /// Missing or `null` follows the upstream default, which is non-streaming.
    pub fn is_stream(&self) -> bool {
        matches!(self.stream, Field::Value(true))
    }
}
