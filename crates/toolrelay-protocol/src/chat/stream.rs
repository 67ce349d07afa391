use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chat::{ChatRole, JsonObject, MessageContent, Usage};
use crate::field::Field;

/// One `chat.completion.chunk` event of a streaming completion.
///
/// Keys upstream leaves out stay out when the chunk is re-serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    /// `chat.completion.chunk`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(flatten)]
    pub extra: JsonObject,
}

impl ChatCompletionChunk {
    /// True once any choice carries a finish reason.
    pub fn is_finished(&self) -> bool {
        self.choices
            .iter()
            .any(|choice| matches!(choice.finish_reason, Field::Value(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<ChunkDelta>,
    /// `stop`, `length`, `tool_calls`, `model_length`, `error`, ...
    /// `null` while the choice is still running.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub finish_reason: Field<String>,
    #[serde(flatten)]
    pub extra: JsonObject,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ChatRole>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub content: Field<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<JsonValue>>,
    #[serde(flatten)]
    pub extra: JsonObject,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_mistral_chunk() {
        let chunk: ChatCompletionChunk = serde_json::from_value(json!({
            "id": "cmpl-1",
            "object": "chat.completion.chunk",
            "created": 1718000000,
            "model": "mistral-small-latest",
            "choices": [{"index": 0, "delta": {"content": "Hel"}, "finish_reason": null}]
        }))
        .unwrap();

        assert_eq!(chunk.choices.len(), 1);
        assert_eq!(
            chunk.choices[0].delta.as_ref().unwrap().content,
            Field::Value(MessageContent::Text("Hel".to_string()))
        );
        assert!(!chunk.is_finished());
    }

    #[test]
    fn final_chunk_carries_usage_and_finish_reason() {
        let raw = json!({
            "id": "cmpl-1",
            "object": "chat.completion.chunk",
            "created": 1718000000,
            "model": "mistral-small-latest",
            "choices": [{"index": 0, "delta": {"content": ""}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        });
        let chunk: ChatCompletionChunk = serde_json::from_value(raw.clone()).unwrap();

        assert!(chunk.is_finished());
        assert_eq!(chunk.usage.as_ref().and_then(|u| u.total_tokens), Some(13));
        assert_eq!(serde_json::to_value(&chunk).unwrap(), raw);
    }

    #[test]
    fn sparse_chunk_is_not_filled_in() {
        let raw = json!({
            "id": "c", "model": "m",
            "choices": [{"delta": {"role": "assistant"}}],
            "usage": {"total_tokens": 4}
        });
        let chunk: ChatCompletionChunk = serde_json::from_value(raw.clone()).unwrap();

        assert!(!chunk.is_finished());
        assert_eq!(serde_json::to_value(&chunk).unwrap(), raw);
    }

    #[test]
    fn explicit_null_finish_reason_is_kept() {
        let raw = json!({
            "id": "c", "model": "m",
            "choices": [{"index": 0, "finish_reason": null}]
        });
        let chunk: ChatCompletionChunk = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(chunk.choices[0].finish_reason, Field::Null);
        assert!(chunk.choices[0].delta.is_none());
        assert_eq!(serde_json::to_value(&chunk).unwrap(), raw);
    }
}
