use bytes::Bytes;
use futures_util::{StreamExt, stream};
use serde_json::{Value, json};

use gembridge_protocol::event::{RawStreamChunk, StreamChunk};
use gembridge_transform::Settings;
use gembridge_transform::generate_content::gemini2openai_chat_completions::{
    GeminiEventMapper, GeminiToOpenAIChatCompletionStreamState, transform_chunk_stream,
    transform_sse_stream,
};

fn state() -> GeminiToOpenAIChatCompletionStreamState {
    GeminiToOpenAIChatCompletionStreamState::new("gemini-2.5-flash", 1_700_000_000)
}

fn raw_events(values: Vec<Value>) -> Vec<Result<StreamChunk, String>> {
    values
        .into_iter()
        .filter_map(|value| serde_json::from_value::<RawStreamChunk>(value).ok())
        .filter_map(RawStreamChunk::into_chunk)
        .map(Ok)
        .collect()
}

async fn collect_frames<S>(frames: S) -> Vec<String>
where
    S: futures_util::Stream<Item = Result<Bytes, std::io::Error>>,
{
    frames
        .map(|frame| String::from_utf8(frame.unwrap().to_vec()).unwrap())
        .collect()
        .await
}

fn payload(frame: &str) -> Value {
    let data = frame
        .strip_prefix("data: ")
        .and_then(|rest| rest.strip_suffix("\n\n"))
        .unwrap();
    serde_json::from_str(data).unwrap()
}

#[tokio::test]
async fn frames_follow_input_order_and_end_once() {
    let events = raw_events(vec![
        json!({"type": "real_thinking", "data": "hmm"}),
        json!({"type": "text", "data": "A"}),
        json!({"type": "usage", "data": {"inputTokens": 2, "outputTokens": 3}}),
        json!({"type": "text", "data": "B"}),
    ]);
    let frames = collect_frames(transform_chunk_stream(stream::iter(events), state())).await;

    assert_eq!(frames.len(), 5);
    assert_eq!(payload(&frames[0])["choices"][0]["delta"], json!({"reasoning": "hmm"}));
    assert_eq!(
        payload(&frames[1])["choices"][0]["delta"],
        json!({"role": "assistant", "content": "A"})
    );
    assert_eq!(payload(&frames[2])["choices"][0]["delta"], json!({"content": "B"}));

    let last = payload(&frames[3]);
    assert_eq!(last["choices"][0]["finish_reason"], "stop");
    assert_eq!(last["usage"]["total_tokens"], 5);
    assert_eq!(frames[4], "data: [DONE]\n\n");
    assert_eq!(
        frames.iter().filter(|frame| frame.contains("[DONE]")).count(),
        1
    );
}

#[tokio::test]
async fn malformed_events_produce_nothing() {
    let events = raw_events(vec![
        json!({"type": "text", "data": 42}),
        json!({"type": "tool_code", "data": {"name": "f"}}),
        json!({"type": "reasoning", "data": {"unrelated": true}}),
        json!({"type": "mystery", "data": "x"}),
        json!({"data": "no tag"}),
    ]);
    assert!(events.is_empty());

    let frames = collect_frames(transform_chunk_stream(stream::iter(events), state())).await;
    assert_eq!(frames.len(), 2);
    assert_eq!(payload(&frames[0])["usage"], Value::Null);
}

#[tokio::test]
async fn upstream_failure_still_terminates() {
    let events: Vec<Result<StreamChunk, String>> = vec![
        Ok(StreamChunk::Text("partial".to_string())),
        Err("connection reset".to_string()),
        Ok(StreamChunk::Text("never".to_string())),
    ];
    let frames = collect_frames(transform_chunk_stream(stream::iter(events), state())).await;

    assert_eq!(frames.len(), 3);
    assert!(!frames.iter().any(|frame| frame.contains("never")));
    assert_eq!(payload(&frames[1])["choices"][0]["finish_reason"], "stop");
    assert_eq!(frames[2], "data: [DONE]\n\n");
}

#[tokio::test]
async fn gemini_sse_with_citations_end_to_end() {
    let settings = Settings {
        enable_inline_citations: true,
        include_grounding_metadata: false,
        ..Settings::default()
    };
    let body = json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": "Rust is fast. Go is simple."}]},
            "groundingMetadata": {
                "groundingChunks": [
                    {"web": {"uri": "https://rust-lang.org", "title": "Rust"}},
                    {"web": {"uri": "https://go.dev", "title": "Go"}}
                ],
                "groundingSupports": [
                    {"segment": {"startIndex": 0, "endIndex": 12}, "groundingChunkIndices": [0]},
                    {"segment": {"startIndex": 14, "endIndex": 26}, "groundingChunkIndices": [1]}
                ]
            }
        }],
        "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 7, "thoughtsTokenCount": 1}
    });
    let upstream: Vec<Result<Bytes, String>> =
        vec![Ok(Bytes::from(format!("data: {body}\n\n")))];

    let frames = collect_frames(transform_sse_stream(
        stream::iter(upstream),
        GeminiEventMapper::new(&settings),
        state(),
    ))
    .await;

    assert_eq!(frames.len(), 3);
    assert_eq!(
        payload(&frames[0])["choices"][0]["delta"]["content"],
        "Rust is fast[1](https://rust-lang.org). Go is simple[2](https://go.dev)."
    );
    assert_eq!(
        payload(&frames[1])["usage"],
        json!({"prompt_tokens": 9, "completion_tokens": 8, "total_tokens": 17})
    );
}
