use std::io;
use std::pin::Pin;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use tracing::{info, warn};

use gembridge_protocol::gemini::generate_content::GenerateContentRequest;

use crate::error::UpstreamPassthroughError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

/// Source of Gemini SSE bytes for one generate request.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn stream_generate(
        &self,
        request: GenerateContentRequest,
    ) -> Result<ByteStream, UpstreamPassthroughError>;
}

#[derive(Clone)]
pub struct GeminiUpstream {
    client: wreq::Client,
    base_url: String,
    api_key: String,
}

impl GeminiUpstream {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, wreq::Error> {
        let client = wreq::Client::builder().build()?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    pub fn with_client(
        client: wreq::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{model}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/')
        )
    }

    fn headers(&self) -> Result<HeaderMap, UpstreamPassthroughError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|err| UpstreamPassthroughError::service_unavailable(err.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl Upstream for GeminiUpstream {
    async fn stream_generate(
        &self,
        request: GenerateContentRequest,
    ) -> Result<ByteStream, UpstreamPassthroughError> {
        let model = request.path.model;
        let url = self.stream_url(&model);
        let started_at = Instant::now();
        info!(
            event = "upstream_request",
            op = "gemini.stream_generate",
            model = %model
        );

        let response = self
            .client
            .post(url)
            .headers(self.headers()?)
            .json(&request.body)
            .send()
            .await
            .map_err(|err| {
                warn!(
                    event = "upstream_response",
                    op = "gemini.stream_generate",
                    status = "error",
                    elapsed_ms = started_at.elapsed().as_millis(),
                    error = %err
                );
                UpstreamPassthroughError::service_unavailable(err.to_string())
            })?;

        let status = response.status();
        info!(
            event = "upstream_response",
            op = "gemini.stream_generate",
            status = %status.as_u16(),
            elapsed_ms = started_at.elapsed().as_millis()
        );

        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|err| UpstreamPassthroughError::service_unavailable(err.to_string()))?;
            return Err(UpstreamPassthroughError::new(status, headers, body));
        }

        let stream = response
            .bytes_stream()
            .map(|item| item.map_err(|err| io::Error::other(err.to_string())));
        Ok(Box::pin(stream))
    }
}
