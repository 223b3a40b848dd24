use serde_json::Value as JsonValue;

use gembridge_protocol::event::{NativeToolKind, NativeToolResponse};

/// Wraps a candidate's URL-context metadata as a native tool result.
/// Missing or empty metadata yields nothing.
pub fn url_context_response(metadata: Option<JsonValue>) -> Option<NativeToolResponse> {
    let metadata = metadata?;
    let empty = match &metadata {
        JsonValue::Null => true,
        JsonValue::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return None;
    }
    Some(NativeToolResponse {
        kind: NativeToolKind::UrlContext,
        data: metadata,
        metadata: None,
    })
}
