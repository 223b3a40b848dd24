use std::collections::VecDeque;
use std::fmt::Display;
use std::io;

use bytes::Bytes;
use futures_util::stream::{Stream, unfold};
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use gembridge_protocol::event::{StreamChunk, UsageData};
use gembridge_protocol::openai::create_chat_completions::{
    ChatCompletionChunkObjectType, ChatCompletionFinishReason,
    ChatCompletionMessageToolCallChunk, ChatCompletionMessageToolCallChunkFunction,
    ChatCompletionResponseRole, ChatCompletionStreamChoice, ChatCompletionStreamResponseDelta,
    ChatCompletionToolCallChunkType, CompletionUsage, CreateChatCompletionStreamResponse,
};
use gembridge_protocol::sse::{sse_done_bytes, sse_json_bytes};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenToolCall {
    pub id: String,
    pub name: String,
}

/// Per-stream state for turning Gemini events into chat-completion chunks.
///
/// One instance serves exactly one stream. `finish` consumes it, so a stream
/// cannot be closed twice.
#[derive(Debug)]
pub struct GeminiToOpenAIChatCompletionStreamState {
    id: String,
    created: i64,
    model: String,
    first_chunk: bool,
    tool_call: Option<OpenToolCall>,
    usage: Option<UsageData>,
}

impl GeminiToOpenAIChatCompletionStreamState {
    pub fn new(model: impl Into<String>, created: i64) -> Self {
        Self {
            id: format!("chatcmpl-{}", Uuid::new_v4()),
            created,
            model: model.into(),
            first_chunk: true,
            tool_call: None,
            usage: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created(&self) -> i64 {
        self.created
    }

    /// The most recent tool call emitted on this stream.
    pub fn tool_call(&self) -> Option<&OpenToolCall> {
        self.tool_call.as_ref()
    }

    pub fn usage(&self) -> Option<UsageData> {
        self.usage
    }

    /// Maps one event to at most one chunk. Usage events and events whose
    /// delta ends up empty produce nothing.
    pub fn transform_chunk(
        &mut self,
        chunk: StreamChunk,
    ) -> Option<CreateChatCompletionStreamResponse> {
        let mut delta = ChatCompletionStreamResponseDelta::default();
        match chunk {
            StreamChunk::Text(text) | StreamChunk::ThinkingContent(text) => {
                delta.content = Some(Some(text));
                if self.first_chunk {
                    delta.role = Some(ChatCompletionResponseRole::Assistant);
                    self.first_chunk = false;
                }
            }
            StreamChunk::RealThinking(text) => {
                delta.reasoning = Some(text);
            }
            StreamChunk::Reasoning(data) => {
                delta.reasoning = data.reasoning;
            }
            StreamChunk::ToolCode(call) => {
                let id = format!("call_{}", Uuid::new_v4());
                delta.tool_calls = Some(vec![ChatCompletionMessageToolCallChunk {
                    index: 0,
                    id: Some(id.clone()),
                    r#type: Some(ChatCompletionToolCallChunkType::Function),
                    function: Some(ChatCompletionMessageToolCallChunkFunction {
                        name: Some(call.name.clone()),
                        arguments: Some(call.args.to_string()),
                    }),
                }]);
                debug!(call_id = %id, name = %call.name, "tool call opened");
                self.tool_call = Some(OpenToolCall {
                    id,
                    name: call.name,
                });
                if self.first_chunk {
                    delta.role = Some(ChatCompletionResponseRole::Assistant);
                    delta.content = Some(None);
                    self.first_chunk = false;
                }
            }
            StreamChunk::NativeTool(response) => {
                delta.native_tool_calls = Some(vec![response]);
            }
            StreamChunk::GroundingMetadata(metadata) => {
                if !is_empty_json(&metadata) {
                    delta.grounding = Some(metadata);
                }
            }
            StreamChunk::Usage(usage) => {
                self.usage = Some(usage);
                return None;
            }
        }

        if delta.is_empty() {
            return None;
        }
        Some(self.envelope(delta, None, None))
    }

    /// Builds the terminal chunk. Finish reason is `tool_calls` when any tool
    /// call was emitted on this stream.
    pub fn finish(self) -> CreateChatCompletionStreamResponse {
        let finish_reason = if self.tool_call.is_some() {
            ChatCompletionFinishReason::ToolCalls
        } else {
            ChatCompletionFinishReason::Stop
        };
        let usage = self.usage.map(|usage| CompletionUsage {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage.input_tokens.saturating_add(usage.output_tokens),
        });
        self.envelope(
            ChatCompletionStreamResponseDelta::default(),
            Some(finish_reason),
            usage,
        )
    }

    /// Terminal chunk followed by the `[DONE]` sentinel, SSE-encoded.
    pub fn finish_frames(self) -> Vec<Bytes> {
        let mut frames = Vec::with_capacity(2);
        push_frame(&mut frames, &self.finish());
        frames.push(sse_done_bytes());
        frames
    }

    fn envelope(
        &self,
        delta: ChatCompletionStreamResponseDelta,
        finish_reason: Option<ChatCompletionFinishReason>,
        usage: Option<CompletionUsage>,
    ) -> CreateChatCompletionStreamResponse {
        CreateChatCompletionStreamResponse {
            id: self.id.clone(),
            object: ChatCompletionChunkObjectType::ChatCompletionChunk,
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatCompletionStreamChoice {
                index: 0,
                delta,
                finish_reason,
                logprobs: None,
                matched_stop: None,
            }],
            usage,
        }
    }
}

pub fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn is_empty_json(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(text) => text.is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn push_frame<C: Extend<Bytes>>(frames: &mut C, response: &CreateChatCompletionStreamResponse) {
    match sse_json_bytes(response) {
        Ok(bytes) => frames.extend(Some(bytes)),
        Err(err) => warn!(error = %err, "failed to encode chat completion chunk"),
    }
}

/// Drives `state` over an event stream and yields SSE frames.
///
/// The next event is pulled only after the previous frame has been taken by
/// the consumer. When the input ends, or yields an error, the terminal chunk
/// and `[DONE]` are emitted once and the stream closes.
pub fn transform_chunk_stream<S, E>(
    upstream: S,
    state: GeminiToOpenAIChatCompletionStreamState,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static
where
    S: Stream<Item = Result<StreamChunk, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    unfold(
        (Box::pin(upstream), Some(state), VecDeque::<Bytes>::new()),
        |(mut upstream, mut state, mut pending)| async move {
            loop {
                if let Some(frame) = pending.pop_front() {
                    return Some((Ok(frame), (upstream, state, pending)));
                }
                let active = state.as_mut()?;
                match upstream.next().await {
                    Some(Ok(chunk)) => {
                        if let Some(response) = active.transform_chunk(chunk) {
                            push_frame(&mut pending, &response);
                        }
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "upstream stream failed, closing response");
                        if let Some(state) = state.take() {
                            pending.extend(state.finish_frames());
                        }
                    }
                    None => {
                        if let Some(state) = state.take() {
                            pending.extend(state.finish_frames());
                        }
                    }
                }
            }
        },
    )
}
