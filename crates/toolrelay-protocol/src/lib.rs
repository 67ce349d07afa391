//! Wire types for the OpenAI-compatible chat-completions surface.
//!
//! Everything here is plain data: serde shapes, the tri-state [`Field`] used for
//! optional request parameters, and the SSE line parser used to decode upstream
//! streams. No IO lives in this crate.

pub mod chat;
pub mod field;
pub mod models;
pub mod sse;

pub use chat::{
    ChatCompletionChunk, ChatCompletionRequestBody, ChatCompletionResponse, ChatMessage,
    ChatRole, ChunkChoice, ChunkDelta, JsonObject, MessageContent, ResponseChoice,
    ResponseMessage, Usage,
};
pub use field::Field;
pub use models::{ListObjectType, ModelEntry, ModelInfo, ModelList, UpstreamModelList};
pub use sse::{DONE_SENTINEL, SseEvent, SseParser};
