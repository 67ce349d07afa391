mod decode;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use wreq::{Client, Method};

use toolrelay_common::{Headers, RelayConfig, RelayError, RelayResult};
use toolrelay_protocol::{ChatCompletionChunk, ChatCompletionResponse, ModelInfo, UpstreamModelList};

use crate::transform::UpstreamCallParams;

pub use decode::decode_sse_chunks;

pub type ChunkStream = BoxStream<'static, RelayResult<ChatCompletionChunk>>;
pub type ModelStream = BoxStream<'static, RelayResult<ModelInfo>>;

/// Result of one chat-completion call.
#[derive(Debug)]
pub enum ChatOutcome {
    Completion(ChatCompletionResponse),
    Stream(UpstreamChunks),
}

/// Single-pass handle on an upstream chunk stream.
///
/// The stream is pulled lazily: nothing is read from the network until the
/// consumer polls. [`UpstreamChunks::take`] hands the stream out once; a second
/// call returns [`RelayError::StreamAlreadyConsumed`].
pub struct UpstreamChunks {
    inner: Option<ChunkStream>,
}

impl UpstreamChunks {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = RelayResult<ChatCompletionChunk>> + Send + 'static,
    {
        Self {
            inner: Some(stream.boxed()),
        }
    }

    pub fn take(&mut self) -> RelayResult<ChunkStream> {
        self.inner.take().ok_or(RelayError::StreamAlreadyConsumed)
    }

    pub fn is_consumed(&self) -> bool {
        self.inner.is_none()
    }
}

impl fmt::Debug for UpstreamChunks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamChunks")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// Upstream chat-completion provider, shared by every in-flight request.
#[async_trait]
pub trait ChatUpstream: Send + Sync {
    /// Streams when `params.is_stream()`, otherwise returns the single completion.
    async fn chat(&self, params: UpstreamCallParams) -> RelayResult<ChatOutcome>;

    async fn list_models(&self) -> RelayResult<ModelStream>;
}

#[derive(Clone)]
pub struct UpstreamClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub connect_timeout: Duration,
    /// Upper bound on a whole exchange, streams included.
    pub request_timeout: Duration,
    /// Deadline for response headers.
    pub first_byte_timeout: Duration,
    /// Longest silence tolerated between two body reads, once headers arrived.
    pub stream_idle_timeout: Duration,
}

impl UpstreamClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            connect_timeout: Duration::from_secs(
                toolrelay_common::DEFAULT_CONNECT_TIMEOUT_SECS,
            ),
            request_timeout: Duration::from_secs(86400),
            first_byte_timeout: Duration::from_secs(
                toolrelay_common::DEFAULT_FIRST_BYTE_TIMEOUT_SECS,
            ),
            stream_idle_timeout: Duration::from_secs(
                toolrelay_common::DEFAULT_STREAM_IDLE_TIMEOUT_SECS,
            ),
        }
    }

    pub fn from_relay(config: &RelayConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            first_byte_timeout: config.first_byte_timeout,
            stream_idle_timeout: config.stream_idle_timeout,
            ..Self::new(config.base_url.clone(), config.api_key.clone())
        }
    }
}

impl fmt::Debug for UpstreamClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("first_byte_timeout", &self.first_byte_timeout)
            .field("stream_idle_timeout", &self.stream_idle_timeout)
            .finish()
    }
}

/// [`ChatUpstream`] over HTTP. Cloning shares the connection pool.
#[derive(Clone)]
pub struct WreqUpstreamClient {
    config: Arc<UpstreamClientConfig>,
    client: Client,
}

impl WreqUpstreamClient {
    pub fn new(config: UpstreamClientConfig) -> Result<Self, wreq::Error> {
        let client = build_client(&config)?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Sends one request and waits for response headers.
    ///
    /// Non-2xx responses are read in full and returned as
    /// [`RelayError::UpstreamRejected`] with status, headers and body untouched.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        is_stream: bool,
    ) -> RelayResult<wreq::Response> {
        let url = self.url(path);
        let started_at = Instant::now();
        info!(
            event = "upstream_request",
            method = %method,
            path = %path,
            is_stream = is_stream
        );

        let accept = if is_stream {
            "text/event-stream"
        } else {
            "application/json"
        };
        let mut builder = self
            .client
            .request(method, &url)
            .header("authorization", format!("Bearer {}", self.config.api_key))
            .header("accept", accept);
        if let Some(body) = body {
            builder = builder.header("content-type", "application/json").body(body);
        }

        let deadline = self.config.first_byte_timeout;
        let response = match tokio::time::timeout(deadline, builder.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                let err = map_wreq_error(err, deadline);
                log_upstream_failure(path, started_at, &err);
                return Err(err);
            }
            Err(_) => {
                let err = RelayError::UpstreamTimeout { after: deadline };
                log_upstream_failure(path, started_at, &err);
                return Err(err);
            }
        };

        let status = response.status();
        info!(
            event = "upstream_response",
            path = %path,
            status = status.as_u16(),
            elapsed_ms = started_at.elapsed().as_millis(),
            is_stream = is_stream
        );
        if status.is_success() {
            return Ok(response);
        }

        let headers = headers_from_wreq(response.headers());
        let body = self.read_body(response).await?;
        warn!(
            event = "upstream_rejected",
            path = %path,
            status = status.as_u16(),
            error_body = %String::from_utf8_lossy(&body)
        );
        Err(RelayError::UpstreamRejected {
            status: status.as_u16(),
            headers,
            body,
        })
    }

    /// Reads a whole non-streaming body, bounded by the idle timeout.
    async fn read_body(&self, response: wreq::Response) -> RelayResult<Bytes> {
        let idle = self.config.stream_idle_timeout;
        match tokio::time::timeout(idle, response.bytes()).await {
            Ok(body) => body.map_err(|err| map_wreq_error(err, idle)),
            Err(_) => Err(RelayError::UpstreamTimeout { after: idle }),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, response: wreq::Response) -> RelayResult<T> {
        let body = self.read_body(response).await?;
        serde_json::from_slice(&body)
            .map_err(|err| RelayError::MalformedChunk(format!("upstream response: {err}")))
    }
}

#[async_trait]
impl ChatUpstream for WreqUpstreamClient {
    async fn chat(&self, params: UpstreamCallParams) -> RelayResult<ChatOutcome> {
        let is_stream = params.is_stream();
        let body = serde_json::to_vec(&params.body)
            .map_err(|err| RelayError::Internal(format!("serialize request: {err}")))?;
        let response = self
            .send(
                Method::POST,
                "chat/completions",
                Some(Bytes::from(body)),
                is_stream,
            )
            .await?;

        if !is_stream {
            return Ok(ChatOutcome::Completion(self.read_json(response).await?));
        }

        let idle = self.config.stream_idle_timeout;
        let bytes = response
            .bytes_stream()
            .map_err(move |err| map_wreq_error(err, idle));
        Ok(ChatOutcome::Stream(UpstreamChunks::new(decode_sse_chunks(
            bytes, idle,
        ))))
    }

    async fn list_models(&self) -> RelayResult<ModelStream> {
        let response = self.send(Method::GET, "models", None, false).await?;
        let list: UpstreamModelList = self.read_json(response).await?;
        Ok(stream::iter(list.data.into_iter().map(Ok)).boxed())
    }
}

fn build_client(config: &UpstreamClientConfig) -> Result<Client, wreq::Error> {
    // Header and body deadlines are applied per call.
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .build()
}

fn log_upstream_failure(path: &str, started_at: Instant, err: &RelayError) {
    warn!(
        event = "upstream_response",
        path = %path,
        status = "error",
        kind = err.kind(),
        elapsed_ms = started_at.elapsed().as_millis(),
        error = %err
    );
}

fn headers_from_wreq(map: &wreq::header::HeaderMap) -> Headers {
    map.iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn map_wreq_error(err: wreq::Error, after: Duration) -> RelayError {
    if err.is_timeout() {
        return RelayError::UpstreamTimeout { after };
    }
    let stage = if err.is_connect() { "connect" } else { "transport" };
    RelayError::unavailable(format!("{stage}: {err}"))
}
