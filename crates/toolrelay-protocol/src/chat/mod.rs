pub mod message;
pub mod request;
pub mod response;
pub mod stream;

pub use message::{ChatMessage, ChatRole, MessageContent};
pub use request::ChatCompletionRequestBody;
pub use response::{ChatCompletionResponse, ResponseChoice, ResponseMessage};
pub use stream::{ChatCompletionChunk, ChunkChoice, ChunkDelta};

use serde::{Deserialize, Serialize};

/// Keys the typed structs do not model. Flattened into them so provider-specific
/// fields survive a decode/encode pass.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<i64>,
    #[serde(flatten)]
    pub extra: JsonObject,
}
