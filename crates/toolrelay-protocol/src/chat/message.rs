use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chat::JsonObject;
use crate::field::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Message content: either plain text or a list of typed parts
/// (`{"type":"text",...}`, `{"type":"image_url",...}`), kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<JsonValue>),
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        MessageContent::Text(value.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        MessageContent::Text(value)
    }
}

/// One conversation message as sent upstream.
///
/// Only `role` and `content` are interpreted. Everything else (`name`,
/// `tool_calls`, `tool_call_id`, `prefix`, ...) rides along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub content: Field<MessageContent>,
    #[serde(flatten)]
    pub extra: JsonObject,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: Field::Value(content.into()),
            extra: JsonObject::new(),
        }
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(ChatRole::System, content)
    }
}
