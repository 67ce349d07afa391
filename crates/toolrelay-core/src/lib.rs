//! Request pipeline of the relay: payload transform, upstream IO and stream re-framing.
//!
//! This crate does not depend on axum. The router crate wires these pieces to HTTP.

pub mod relay;
pub mod transform;
pub mod upstream_client;

pub use relay::{DONE_FRAME, FrameStream, StreamRelay, encode_completion, encode_frame};
pub use transform::{PayloadTransformer, SYSTEM_PROMPT, UpstreamCallParams};
pub use upstream_client::{
    ChatOutcome, ChatUpstream, ChunkStream, ModelStream, UpstreamChunks, UpstreamClientConfig,
    WreqUpstreamClient, decode_sse_chunks,
};
