use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tracing::{debug, warn};

use toolrelay_common::{RelayError, RelayResult};
use toolrelay_protocol::{ChatCompletionChunk, ChatCompletionResponse};

use crate::upstream_client::ChunkStream;

/// Terminal frame written after the last chunk of a completed stream.
pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

pub type FrameStream = BoxStream<'static, RelayResult<Bytes>>;

/// `data: <json>\n\n` for one chunk.
pub fn encode_frame(chunk: &ChatCompletionChunk) -> RelayResult<Bytes> {
    Ok(frame_json(&to_json(chunk)?))
}

/// Plain JSON body for a non-streaming completion.
pub fn encode_completion(response: &ChatCompletionResponse) -> RelayResult<Bytes> {
    to_json(response).map(Bytes::from)
}

fn to_json<T: serde::Serialize>(value: &T) -> RelayResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|err| RelayError::Internal(format!("serialize: {err}")))
}

fn frame_json(json: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(json.len() + 8);
    frame.extend_from_slice(b"data: ");
    frame.extend_from_slice(json);
    frame.extend_from_slice(b"\n\n");
    frame.freeze()
}

/// Re-frames upstream chunks for the downstream body.
///
/// One frame per chunk, in upstream order, nothing buffered beyond the chunk
/// being written. Pulls happen only when the body is polled, so dropping the
/// returned stream stops reading from upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamRelay {
    log_chunks: bool,
}

impl StreamRelay {
    pub fn new(log_chunks: bool) -> Self {
        Self { log_chunks }
    }

    /// Frames `events`. A clean end yields [`DONE_FRAME`]; an error is yielded
    /// once and ends the stream without it.
    pub fn relay(&self, events: ChunkStream) -> FrameStream {
        let state = RelayProgress {
            events,
            log_chunks: self.log_chunks,
            frames: 0,
            done: false,
        };
        stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }
            let item = state.next_frame().await;
            Some((item, state))
        })
        .boxed()
    }
}

struct RelayProgress {
    events: ChunkStream,
    log_chunks: bool,
    frames: u64,
    done: bool,
}

impl RelayProgress {
    async fn next_frame(&mut self) -> RelayResult<Bytes> {
        match self.events.next().await {
            Some(Ok(chunk)) => match to_json(&chunk) {
                Ok(json) => {
                    self.frames += 1;
                    if self.log_chunks {
                        debug!(
                            event = "relay_chunk",
                            seq = self.frames,
                            chunk = %String::from_utf8_lossy(&json)
                        );
                    }
                    Ok(frame_json(&json))
                }
                Err(err) => self.abort(err),
            },
            Some(Err(err)) => self.abort(err),
            None => {
                self.done = true;
                debug!(event = "relay_completed", frames = self.frames);
                Ok(Bytes::from_static(DONE_FRAME))
            }
        }
    }

    fn abort(&mut self, err: RelayError) -> RelayResult<Bytes> {
        self.done = true;
        warn!(
            event = "relay_aborted",
            frames = self.frames,
            kind = err.kind(),
            error = %err
        );
        Err(err)
    }
}
