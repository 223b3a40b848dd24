pub mod events;
pub mod stream;

use std::fmt::Display;
use std::io;

use bytes::Bytes;
use futures_util::stream::Stream;

use crate::citations::Annotator;

pub use events::{GeminiEventMapper, gemini_sse_to_chunks};
pub use stream::{GeminiToOpenAIChatCompletionStreamState, now_unix, transform_chunk_stream};

/// Gemini SSE bytes in, chat-completion SSE frames out.
pub fn transform_sse_stream<S, E, A>(
    upstream: S,
    mapper: GeminiEventMapper<A>,
    state: GeminiToOpenAIChatCompletionStreamState,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
    A: Annotator + 'static,
{
    transform_chunk_stream(gemini_sse_to_chunks(upstream, mapper), state)
}
