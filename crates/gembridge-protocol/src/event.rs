//! Input events produced from a Gemini stream, one tagged payload each.
//!
//! In-process producers build [`StreamChunk`] directly. Events that arrive as
//! JSON go through [`RawStreamChunk::into_chunk`], which applies the per-tag
//! shape check and drops anything that does not match.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamChunk {
    Text(String),
    ThinkingContent(String),
    /// Reasoning text streamed directly from thought parts.
    RealThinking(String),
    Reasoning(ReasoningData),
    ToolCode(GeminiFunctionCall),
    NativeTool(NativeToolResponse),
    GroundingMetadata(JsonValue),
    Usage(UsageData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    pub name: String,
    pub args: JsonValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeToolKind {
    Search,
    UrlContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeToolResponse {
    #[serde(rename = "type")]
    pub kind: NativeToolKind,
    pub data: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageData {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// An event exactly as it arrived on the wire, before any shape check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStreamChunk {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: JsonValue,
}

impl RawStreamChunk {
    /// Returns `None` for unknown tags and for payloads that fail the shape
    /// check of their tag.
    pub fn into_chunk(self) -> Option<StreamChunk> {
        let RawStreamChunk { kind, data } = self;
        match kind.as_str() {
            "text" => string_payload(data).map(StreamChunk::Text),
            "thinking_content" => string_payload(data).map(StreamChunk::ThinkingContent),
            "real_thinking" => string_payload(data).map(StreamChunk::RealThinking),
            "reasoning" => {
                if !has_any_key(&data, &["reasoning", "toolCode"]) {
                    return None;
                }
                serde_json::from_value(data).ok().map(StreamChunk::Reasoning)
            }
            "tool_code" => {
                if !has_all_keys(&data, &["name", "args"]) {
                    return None;
                }
                serde_json::from_value(data).ok().map(StreamChunk::ToolCode)
            }
            "native_tool" => {
                if !has_all_keys(&data, &["type", "data"]) {
                    return None;
                }
                serde_json::from_value(data).ok().map(StreamChunk::NativeTool)
            }
            "grounding_metadata" => Some(StreamChunk::GroundingMetadata(data)),
            "usage" => {
                if !has_all_keys(&data, &["inputTokens", "outputTokens"]) {
                    return None;
                }
                serde_json::from_value(data).ok().map(StreamChunk::Usage)
            }
            _ => None,
        }
    }
}

fn string_payload(data: JsonValue) -> Option<String> {
    match data {
        JsonValue::String(text) => Some(text),
        _ => None,
    }
}

fn has_any_key(data: &JsonValue, keys: &[&str]) -> bool {
    data.as_object()
        .is_some_and(|object| keys.iter().any(|key| object.contains_key(*key)))
}

fn has_all_keys(data: &JsonValue, keys: &[&str]) -> bool {
    data.as_object()
        .is_some_and(|object| keys.iter().all(|key| object.contains_key(*key)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: JsonValue) -> RawStreamChunk {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn text_payload_must_be_a_string() {
        assert_eq!(
            raw(json!({"type": "text", "data": "hi"})).into_chunk(),
            Some(StreamChunk::Text("hi".to_string()))
        );
        assert_eq!(raw(json!({"type": "text", "data": 3})).into_chunk(), None);
        assert_eq!(raw(json!({"type": "text"})).into_chunk(), None);
    }

    #[test]
    fn reasoning_requires_a_known_key() {
        assert_eq!(
            raw(json!({"type": "reasoning", "data": {"other": "x"}})).into_chunk(),
            None
        );
        assert_eq!(
            raw(json!({"type": "reasoning", "data": "plain"})).into_chunk(),
            None
        );
        assert_eq!(
            raw(json!({"type": "reasoning", "data": {"reasoning": "why"}})).into_chunk(),
            Some(StreamChunk::Reasoning(ReasoningData {
                reasoning: Some("why".to_string()),
                tool_code: None,
            }))
        );
    }

    #[test]
    fn tool_code_needs_name_and_args() {
        assert_eq!(
            raw(json!({"type": "tool_code", "data": {"name": "lookup"}})).into_chunk(),
            None
        );
        let chunk = raw(json!({"type": "tool_code", "data": {"name": "lookup", "args": {"q": 1}}}))
            .into_chunk();
        assert_eq!(
            chunk,
            Some(StreamChunk::ToolCode(GeminiFunctionCall {
                name: "lookup".to_string(),
                args: json!({"q": 1}),
            }))
        );
    }

    #[test]
    fn usage_and_native_tool_shapes() {
        assert_eq!(
            raw(json!({"type": "usage", "data": {"inputTokens": 4}})).into_chunk(),
            None
        );
        assert_eq!(
            raw(json!({"type": "usage", "data": {"inputTokens": 4, "outputTokens": 6}}))
                .into_chunk(),
            Some(StreamChunk::Usage(UsageData {
                input_tokens: 4,
                output_tokens: 6,
            }))
        );
        assert_eq!(
            raw(json!({"type": "native_tool", "data": {"type": "url_context"}})).into_chunk(),
            None
        );
        assert!(matches!(
            raw(json!({"type": "native_tool", "data": {"type": "url_context", "data": []}}))
                .into_chunk(),
            Some(StreamChunk::NativeTool(NativeToolResponse {
                kind: NativeToolKind::UrlContext,
                ..
            }))
        ));
    }

    #[test]
    fn unknown_tag_is_dropped() {
        assert_eq!(raw(json!({"type": "image", "data": "x"})).into_chunk(), None);
    }

    #[test]
    fn typed_chunks_use_the_wire_tags() {
        let value = serde_json::to_value(StreamChunk::RealThinking("hmm".to_string())).unwrap();
        assert_eq!(value, json!({"type": "real_thinking", "data": "hmm"}));
    }
}
