use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};

use toolrelay_common::{RelayError, RelayResult};
use toolrelay_protocol::{ChatCompletionChunk, SseEvent, SseParser};

use super::ChunkStream;

/// Decodes an upstream SSE byte stream into chat-completion chunks.
///
/// Ends cleanly at `data: [DONE]`. A stream that closes without the marker
/// ends cleanly only if a chunk already carried a finish reason. The first
/// error is yielded once and ends the stream.
pub fn decode_sse_chunks<S>(bytes: S, idle_timeout: Duration) -> ChunkStream
where
    S: Stream<Item = RelayResult<Bytes>> + Send + 'static,
{
    let state = DecodeState {
        bytes: bytes.boxed(),
        parser: SseParser::new(),
        pending: VecDeque::new(),
        idle_timeout,
        eof: false,
        finished: false,
        saw_finish: false,
    };
    stream::unfold(state, |mut state| async move {
        let item = state.next_chunk().await?;
        Some((item, state))
    })
    .boxed()
}

struct DecodeState {
    bytes: BoxStream<'static, RelayResult<Bytes>>,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
    idle_timeout: Duration,
    eof: bool,
    finished: bool,
    saw_finish: bool,
}

impl DecodeState {
    async fn next_chunk(&mut self) -> Option<RelayResult<ChatCompletionChunk>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(event) = self.pending.pop_front() {
                if event.is_done() {
                    self.finished = true;
                    return None;
                }
                if event.data.trim().is_empty() {
                    continue;
                }
                return Some(self.decode(&event.data));
            }

            if self.eof {
                self.finished = true;
                if self.saw_finish {
                    return None;
                }
                return Some(Err(RelayError::unavailable(
                    "upstream closed the stream before completion",
                )));
            }

            match tokio::time::timeout(self.idle_timeout, self.bytes.next()).await {
                Ok(Some(Ok(bytes))) => {
                    let events = self.parser.push_bytes(&bytes);
                    self.pending.extend(events);
                }
                Ok(Some(Err(err))) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                Ok(None) => {
                    self.eof = true;
                    let tail = self.parser.finish();
                    self.pending.extend(tail);
                }
                Err(_) => {
                    self.finished = true;
                    return Some(Err(RelayError::UpstreamTimeout {
                        after: self.idle_timeout,
                    }));
                }
            }
        }
    }

    fn decode(&mut self, data: &str) -> RelayResult<ChatCompletionChunk> {
        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => {
                if chunk.is_finished() {
                    self.saw_finish = true;
                }
                Ok(chunk)
            }
            Err(err) => {
                self.finished = true;
                Err(RelayError::MalformedChunk(err.to_string()))
            }
        }
    }
}
