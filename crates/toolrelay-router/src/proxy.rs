use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderName, HeaderValue, Request, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::LengthLimitError;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use toolrelay_common::{Headers, RelayError, is_hop_by_hop_or_framing_header};
use toolrelay_core::{
    ChatOutcome, ChatUpstream, FrameStream, PayloadTransformer, StreamRelay, encode_completion,
};
use toolrelay_protocol::{ModelEntry, ModelList};

const MAX_REQUEST_BODY_BYTES: usize = 50 * 1024 * 1024;
const STREAM_CONTENT_TYPE: &str = "application/x-ndjson";

/// Shared per-process state. Cloned into every request; everything inside is read-only.
#[derive(Clone)]
pub struct RelayState {
    pub upstream: Arc<dyn ChatUpstream>,
    pub transformer: Arc<PayloadTransformer>,
    pub relay: StreamRelay,
    /// Logs inbound bodies and relayed chunks.
    pub debug: bool,
}

impl RelayState {
    pub fn new(upstream: Arc<dyn ChatUpstream>, debug: bool) -> Self {
        Self {
            upstream,
            transformer: Arc::new(PayloadTransformer::default()),
            relay: StreamRelay::new(debug),
            debug,
        }
    }
}

pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            log_request_body,
        ))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .with_state(state)
}

/// Logs the raw request body at debug level, then hands an identical request on.
async fn log_request_body(
    State(state): State<RelayState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.debug {
        return next.run(req).await;
    }

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_REQUEST_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let err = err.into_inner();
            if err.is::<LengthLimitError>() {
                return payload_too_large_response();
            }
            return error_response(
                "-",
                RelayError::malformed(format!("unable to read request body: {err}")),
            );
        }
    };
    debug!(
        event = "downstream_request",
        method = %parts.method,
        path = %parts.uri.path(),
        body = %String::from_utf8_lossy(&bytes)
    );
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn health() -> Json<&'static str> {
    Json("ok")
}

async fn list_models(State(state): State<RelayState>) -> Response {
    let trace_id = new_trace_id();
    let started_at = Instant::now();

    let models = match state.upstream.list_models().await {
        Ok(models) => models,
        Err(err) => return error_response(&trace_id, err),
    };
    let data: Vec<ModelEntry> = match models.map_ok(ModelEntry::from).try_collect().await {
        Ok(data) => data,
        Err(err) => return error_response(&trace_id, err),
    };

    info!(
        event = "models_listed",
        trace_id = %trace_id,
        count = data.len(),
        elapsed_ms = started_at.elapsed().as_millis()
    );
    Json(ModelList::new(data)).into_response()
}

async fn chat_completions(State(state): State<RelayState>, body: Bytes) -> Response {
    let trace_id = new_trace_id();

    let params = match state.transformer.transform(&body) {
        Ok(params) => params,
        Err(err) => return error_response(&trace_id, err),
    };
    info!(
        event = "chat_request",
        trace_id = %trace_id,
        model = %params.model(),
        is_stream = params.is_stream(),
        messages = params.body.messages.len()
    );

    match state.upstream.chat(params).await {
        Ok(ChatOutcome::Completion(completion)) => match encode_completion(&completion) {
            Ok(body) => json_response(body),
            Err(err) => error_response(&trace_id, err),
        },
        Ok(ChatOutcome::Stream(mut chunks)) => match chunks.take() {
            Ok(events) => stream_response(state.relay.relay(events)),
            Err(err) => error_response(&trace_id, err),
        },
        Err(err) => error_response(&trace_id, err),
    }
}

fn new_trace_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

fn json_response(body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn stream_response(frames: FrameStream) -> Response {
    let mut response = Response::new(Body::from_stream(frames));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(STREAM_CONTENT_TYPE),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    response
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: &'static str,
}

fn error_response(trace_id: &str, err: RelayError) -> Response {
    let status = match &err {
        RelayError::UpstreamRejected {
            status,
            headers,
            body,
        } => {
            return passthrough_response(*status, headers, body.clone());
        }
        RelayError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        RelayError::UpstreamUnavailable(_) | RelayError::MalformedChunk(_) => {
            StatusCode::BAD_GATEWAY
        }
        RelayError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        RelayError::StreamAlreadyConsumed | RelayError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(
            event = "request_failed",
            trace_id = %trace_id,
            kind = err.kind(),
            error = %err
        );
    } else {
        warn!(
            event = "request_failed",
            trace_id = %trace_id,
            status = status.as_u16(),
            kind = err.kind(),
            error = %err
        );
    }

    let body = ErrorBody {
        error: ErrorDetail {
            message: err.to_string(),
            kind: err.kind(),
        },
    };
    (status, Json(body)).into_response()
}

/// Same status the body-limit layer gives when debug logging is off.
fn payload_too_large_response() -> Response {
    warn!(
        event = "request_failed",
        status = StatusCode::PAYLOAD_TOO_LARGE.as_u16(),
        kind = "request_too_large",
        limit_bytes = MAX_REQUEST_BODY_BYTES
    );
    let body = ErrorBody {
        error: ErrorDetail {
            message: format!("request body exceeds {MAX_REQUEST_BODY_BYTES} bytes"),
            kind: "request_too_large",
        },
    };
    (StatusCode::PAYLOAD_TOO_LARGE, Json(body)).into_response()
}

/// Rebuilds an upstream error response for the caller, status and body untouched.
fn passthrough_response(status: u16, headers: &Headers, body: Bytes) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    if let Some(h) = builder.headers_mut() {
        for (k, v) in headers {
            if is_hop_by_hop_or_framing_header(k) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                h.append(name, value);
            }
        }
    }

    builder.body(Body::from(body)).unwrap_or_else(|_| {
        (StatusCode::INTERNAL_SERVER_ERROR, "response_build_failed").into_response()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_drops_framing_headers() {
        let headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("content-length".to_string(), "999".to_string()),
            ("transfer-encoding".to_string(), "chunked".to_string()),
            ("x-ratelimit-remaining".to_string(), "0".to_string()),
        ];
        let response = passthrough_response(429, &headers, Bytes::from_static(b"{}"));

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let h = response.headers();
        assert_eq!(h["content-type"], "application/json");
        assert_eq!(h["x-ratelimit-remaining"], "0");
        assert!(h.get("transfer-encoding").is_none());
        assert_ne!(
            h.get("content-length").and_then(|v| v.to_str().ok()),
            Some("999")
        );
    }

    #[test]
    fn error_statuses_follow_error_kind() {
        let cases = [
            (RelayError::malformed("x"), StatusCode::BAD_REQUEST),
            (RelayError::unavailable("x"), StatusCode::BAD_GATEWAY),
            (
                RelayError::UpstreamTimeout {
                    after: std::time::Duration::from_secs(1),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                RelayError::StreamAlreadyConsumed,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(error_response("t", err).status(), expected);
        }
    }
}
