use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Uri};
use axum::response::Response;
use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use serde_json::{Value, json};
use tracing::info;

use gembridge_protocol::openai::create_chat_completions::CreateChatCompletionRequest;
use gembridge_protocol::sse;
use gembridge_transform::generate_content::gemini2openai_chat_completions::{
    GeminiEventMapper, GeminiToOpenAIChatCompletionStreamState, now_unix, transform_sse_stream,
};
use gembridge_transform::generate_content::openai_chat_completions2gemini::request::transform_request;

use crate::core::CoreState;
use crate::error::{ProxyError, UpstreamPassthroughError};

pub async fn chat_completions_handler(
    State(state): State<Arc<CoreState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: CreateChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return error_response(ProxyError::bad_request(format!(
                "invalid request body: {err}"
            )));
        }
    };
    if request.model.trim().is_empty() {
        return error_response(ProxyError::bad_request("model is required"));
    }
    if request.stream != Some(true) {
        return error_response(ProxyError::bad_request(
            "only streaming requests are supported; set \"stream\": true",
        ));
    }

    let model = request.model.clone();
    let upstream_request = transform_request(request, &state.tools);
    info!(
        event = "chat_completion",
        request_id = %request_id(&headers).unwrap_or_default(),
        model = %model,
        messages = upstream_request.body.contents.len(),
        tools = upstream_request.body.tools.as_ref().map_or(0, Vec::len)
    );

    let upstream = match state.upstream.stream_generate(upstream_request).await {
        Ok(stream) => stream,
        Err(err) => return passthrough_error(err),
    };

    let mapper = GeminiEventMapper::new(&state.settings);
    let stream_state = GeminiToOpenAIChatCompletionStreamState::new(model, now_unix());
    let frames = transform_sse_stream(upstream, mapper, stream_state);

    let mut resp = Response::new(Body::from_stream(frames));
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(sse::CONTENT_TYPE));
    resp.headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    resp
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found_handler(uri: Uri) -> Response {
    error_response(ProxyError::not_found(format!("no route for {}", uri.path())))
}

fn passthrough_error(err: UpstreamPassthroughError) -> Response {
    let mut headers = err.headers;
    headers.remove(CONTENT_LENGTH);
    headers.remove(TRANSFER_ENCODING);
    let mut resp = Response::new(Body::from(err.body));
    *resp.status_mut() = err.status;
    resp.headers_mut().extend(headers);
    resp
}

fn error_response(err: ProxyError) -> Response {
    let mut resp = Response::new(Body::from(err.body));
    *resp.status_mut() = err.status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .or_else(|| headers.get("request-id"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}
