use std::time::Duration;

use bytes::Bytes;

use crate::headers::Headers;

pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Inbound body is not JSON, or `model`/`messages` is missing or mistyped.
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    /// Upstream answered with a non-2xx status. Relayed to the caller unchanged.
    #[error("upstream rejected request with status {status}")]
    UpstreamRejected {
        status: u16,
        headers: Headers,
        body: Bytes,
    },
    /// No HTTP response: connect, DNS, TLS or transport failure.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("upstream timed out after {after:?}")]
    UpstreamTimeout { after: Duration },
    /// A chunk stream was taken twice.
    #[error("upstream stream already consumed")]
    StreamAlreadyConsumed,
    /// Upstream sent an event whose payload is not a completion chunk.
    #[error("malformed upstream chunk: {0}")]
    MalformedChunk(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn malformed(message: impl Into<String>) -> Self {
        RelayError::MalformedRequest(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        RelayError::UpstreamUnavailable(message.into())
    }

    /// Stable machine-readable kind, used as the `type` of JSON error bodies and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MalformedRequest(_) => "invalid_request_error",
            RelayError::UpstreamRejected { .. } => "upstream_rejected",
            RelayError::UpstreamUnavailable(_) => "upstream_unavailable",
            RelayError::UpstreamTimeout { .. } => "upstream_timeout",
            RelayError::StreamAlreadyConsumed => "stream_already_consumed",
            RelayError::MalformedChunk(_) => "upstream_malformed_chunk",
            RelayError::Internal(_) => "internal_error",
        }
    }
}
