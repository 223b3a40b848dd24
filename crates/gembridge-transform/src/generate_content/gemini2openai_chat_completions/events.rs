use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{Stream, unfold};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use gembridge_protocol::event::{GeminiFunctionCall, StreamChunk, UsageData};
use gembridge_protocol::gemini::generate_content::{
    Candidate, GenerateContentResponse, GroundingMetadata, UsageMetadata,
};
use gembridge_protocol::sse::{DONE, StreamDecoder};

use crate::citations::{Annotator, CitationsProcessor, grounding_summary, search_entry_point};
use crate::native_tools::url_context_response;
use crate::settings::Settings;

/// Turns decoded Gemini responses into ordered [`StreamChunk`]s.
#[derive(Debug, Clone)]
pub struct GeminiEventMapper<A = CitationsProcessor> {
    annotator: A,
    include_grounding_metadata: bool,
    include_search_entry_point: bool,
}

impl GeminiEventMapper<CitationsProcessor> {
    pub fn new(settings: &Settings) -> Self {
        Self::with_annotator(CitationsProcessor::new(settings), settings)
    }
}

impl<A: Annotator> GeminiEventMapper<A> {
    pub fn with_annotator(annotator: A, settings: &Settings) -> Self {
        Self {
            annotator,
            include_grounding_metadata: settings.include_grounding_metadata,
            include_search_entry_point: settings.include_search_entry_point,
        }
    }

    pub fn map_response(&self, response: GenerateContentResponse) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        for candidate in response.candidates {
            self.map_candidate(candidate, &mut chunks);
        }
        if let Some(usage) = response.usage_metadata {
            chunks.push(StreamChunk::Usage(usage_data(&usage)));
        }
        chunks
    }

    /// Maps one SSE `data` payload. A payload may hold a single response
    /// object or an array of them; anything unparseable is logged and
    /// dropped.
    pub fn map_payload(&self, payload: &str) -> Vec<StreamChunk> {
        let payload = payload.trim();
        if payload.is_empty() || payload == DONE {
            return Vec::new();
        }
        let value: JsonValue = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "dropping unparseable gemini payload");
                return Vec::new();
            }
        };
        let items = match value {
            JsonValue::Array(items) => items,
            other => vec![other],
        };

        let mut chunks = Vec::new();
        for item in items {
            match serde_json::from_value::<GenerateContentResponse>(item) {
                Ok(response) => chunks.extend(self.map_response(response)),
                Err(err) => warn!(error = %err, "dropping malformed gemini response"),
            }
        }
        chunks
    }

    fn map_candidate(&self, candidate: Candidate, chunks: &mut Vec<StreamChunk>) {
        let metadata = candidate
            .grounding_metadata
            .as_ref()
            .and_then(|raw| serde_json::from_value::<GroundingMetadata>(raw.clone()).ok());
        if let Some(metadata) = &metadata {
            let summary = grounding_summary(metadata);
            debug!(
                queries = summary.query_count,
                sources = summary.source_count,
                supports = summary.support_count,
                entry_point = search_entry_point(metadata).is_some(),
                "grounding metadata received"
            );
        }

        if let Some(content) = candidate.content {
            for part in content.parts {
                if let Some(text) = part.text.filter(|text| !text.is_empty()) {
                    if part.thought == Some(true) {
                        chunks.push(StreamChunk::RealThinking(text));
                    } else {
                        let text = self.annotator.annotate(&text, metadata.as_ref()).into_owned();
                        chunks.push(StreamChunk::Text(text));
                    }
                }
                if let Some(call) = part.function_call {
                    chunks.push(StreamChunk::ToolCode(GeminiFunctionCall {
                        name: call.name,
                        args: call
                            .args
                            .unwrap_or_else(|| JsonValue::Object(Default::default())),
                    }));
                }
            }
        }

        if let Some(response) = url_context_response(candidate.url_context_metadata) {
            chunks.push(StreamChunk::NativeTool(response));
        }

        if self.include_grounding_metadata
            && let Some(mut raw) = candidate.grounding_metadata
        {
            if !self.include_search_entry_point
                && let Some(object) = raw.as_object_mut()
            {
                object.remove("searchEntryPoint");
            }
            chunks.push(StreamChunk::GroundingMetadata(raw));
        }
    }
}

fn usage_data(usage: &UsageMetadata) -> UsageData {
    let output = usage
        .candidates_token_count
        .unwrap_or_default()
        .saturating_add(usage.thoughts_token_count.unwrap_or_default());
    UsageData {
        input_tokens: usage.prompt_token_count,
        output_tokens: output,
    }
}

/// Decodes a Gemini SSE byte stream into events.
///
/// Transport errors are passed through unchanged and end the stream.
pub fn gemini_sse_to_chunks<S, E, A>(
    upstream: S,
    mapper: GeminiEventMapper<A>,
) -> impl Stream<Item = Result<StreamChunk, E>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
    A: Annotator + 'static,
{
    unfold(
        (
            Box::pin(upstream),
            StreamDecoder::new(),
            mapper,
            VecDeque::<StreamChunk>::new(),
            false,
        ),
        |(mut upstream, mut decoder, mapper, mut pending, mut done)| async move {
            loop {
                if let Some(chunk) = pending.pop_front() {
                    return Some((Ok(chunk), (upstream, decoder, mapper, pending, done)));
                }
                if done {
                    return None;
                }
                match upstream.next().await {
                    Some(Ok(bytes)) => {
                        for payload in decoder.push(&bytes) {
                            pending.extend(mapper.map_payload(&payload));
                        }
                    }
                    Some(Err(err)) => {
                        done = true;
                        return Some((Err(err), (upstream, decoder, mapper, pending, done)));
                    }
                    None => {
                        done = true;
                        for payload in decoder.finish() {
                            pending.extend(mapper.map_payload(&payload));
                        }
                    }
                }
            }
        },
    )
}
