//! Inline citation markers for grounded text.
//!
//! Grounding supports point at character ranges of the text a response chunk
//! carried. Each accepted support becomes a `[n](uri)` marker placed right
//! after its range, moved forward to the next whitespace or punctuation so a
//! marker never splits a word.

use std::borrow::Cow;

use serde::Serialize;

use gembridge_protocol::gemini::generate_content::{GroundingChunk, GroundingMetadata, GroundingSupport};

use crate::settings::Settings;

/// Rewrites text given the grounding metadata that accompanied it.
pub trait Annotator: Send + Sync {
    fn annotate<'a>(&self, text: &'a str, metadata: Option<&GroundingMetadata>) -> Cow<'a, str>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CitationsProcessor {
    enable_inline_citations: bool,
}

impl CitationsProcessor {
    pub fn new(settings: &Settings) -> Self {
        Self::with_enabled(settings.enable_inline_citations)
    }

    pub fn with_enabled(enable_inline_citations: bool) -> Self {
        Self {
            enable_inline_citations,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enable_inline_citations
    }

    /// Returns the text with citation markers inserted, or the input untouched
    /// when annotation is disabled or nothing applies.
    pub fn process_chunk<'a>(
        &self,
        text: &'a str,
        metadata: Option<&GroundingMetadata>,
    ) -> Cow<'a, str> {
        if !self.enable_inline_citations {
            return Cow::Borrowed(text);
        }
        let Some(metadata) = metadata else {
            return Cow::Borrowed(text);
        };
        if metadata.grounding_supports.is_empty() || metadata.grounding_chunks.is_empty() {
            return Cow::Borrowed(text);
        }

        let indexed: Vec<(usize, char)> = text.char_indices().collect();
        let insertions = collect_insertions(&indexed, metadata);
        if insertions.is_empty() {
            return Cow::Borrowed(text);
        }

        let extra: usize = insertions.iter().map(|(_, citation)| citation.len()).sum();
        let mut out = String::with_capacity(text.len() + extra);
        let mut cursor = 0;
        for (position, citation) in insertions {
            let byte = indexed
                .get(position)
                .map(|(byte, _)| *byte)
                .unwrap_or(text.len());
            out.push_str(&text[cursor..byte]);
            out.push_str(&citation);
            cursor = byte;
        }
        out.push_str(&text[cursor..]);
        Cow::Owned(out)
    }
}

impl Annotator for CitationsProcessor {
    fn annotate<'a>(&self, text: &'a str, metadata: Option<&GroundingMetadata>) -> Cow<'a, str> {
        self.process_chunk(text, metadata)
    }
}

/// Accepted (insert position, citation) pairs ordered by position in the
/// original text. Ties keep the start-offset order of their supports.
fn collect_insertions(
    indexed: &[(usize, char)],
    metadata: &GroundingMetadata,
) -> Vec<(usize, String)> {
    let text_len = indexed.len();
    let mut supports: Vec<&GroundingSupport> = metadata.grounding_supports.iter().collect();
    supports.sort_by_key(|support| {
        support
            .segment
            .as_ref()
            .and_then(|segment| segment.start_index)
            .unwrap_or(0)
    });

    let mut insertions = Vec::new();
    for support in supports {
        let Some(segment) = support.segment.as_ref() else {
            continue;
        };
        let (Some(start), Some(end)) = (segment.start_index, segment.end_index) else {
            continue;
        };
        if start < 0 || support.grounding_chunk_indices.is_empty() {
            continue;
        }
        let Ok(end) = usize::try_from(end) else {
            continue;
        };
        if end > text_len {
            continue;
        }
        let Some(citation) = citation_string(support, &metadata.grounding_chunks) else {
            continue;
        };
        insertions.push((find_safe_insertion_point(indexed, end), citation));
    }
    insertions.sort_by_key(|(position, _)| *position);
    insertions
}

fn citation_string(support: &GroundingSupport, chunks: &[GroundingChunk]) -> Option<String> {
    let links: Vec<String> = support
        .grounding_chunk_indices
        .iter()
        .filter_map(|&index| {
            let slot = usize::try_from(index).ok()?;
            let uri = chunks
                .get(slot)?
                .web
                .as_ref()?
                .uri
                .as_deref()
                .filter(|uri| !uri.is_empty())?;
            Some(format!("[{}]({uri})", slot + 1))
        })
        .collect();
    if links.is_empty() {
        None
    } else {
        Some(links.join(", "))
    }
}

fn is_safe_break(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '.' | ',' | '!' | '?' | ';' | ':')
}

/// First position at or after `index` holding whitespace or punctuation, or
/// the end of the text.
fn find_safe_insertion_point(indexed: &[(usize, char)], index: usize) -> usize {
    if index >= indexed.len() {
        return indexed.len();
    }
    indexed[index..]
        .iter()
        .position(|(_, ch)| is_safe_break(*ch))
        .map(|found| index + found)
        .unwrap_or(indexed.len())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationSource {
    pub id: usize,
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingSummary {
    pub query_count: usize,
    pub source_count: usize,
    pub support_count: usize,
    pub queries: Vec<String>,
    pub sources: Vec<CitationSource>,
}

pub fn search_queries(metadata: &GroundingMetadata) -> Vec<String> {
    metadata.web_search_queries.clone().unwrap_or_default()
}

pub fn source_list(metadata: &GroundingMetadata) -> Vec<CitationSource> {
    metadata
        .grounding_chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            let web = chunk.web.clone().unwrap_or_default();
            CitationSource {
                id: index + 1,
                title: web.title.unwrap_or_default(),
                uri: web.uri.unwrap_or_default(),
            }
        })
        .collect()
}

pub fn search_entry_point(metadata: &GroundingMetadata) -> Option<&str> {
    metadata
        .search_entry_point
        .as_ref()?
        .rendered_content
        .as_deref()
        .filter(|content| !content.is_empty())
}

pub fn grounding_summary(metadata: &GroundingMetadata) -> GroundingSummary {
    GroundingSummary {
        query_count: metadata.web_search_queries.as_ref().map_or(0, Vec::len),
        source_count: metadata.grounding_chunks.len(),
        support_count: metadata.grounding_supports.len(),
        queries: search_queries(metadata),
        sources: source_list(metadata),
    }
}
