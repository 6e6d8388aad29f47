pub mod decoder;

use futures_util::stream::{Stream, StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use crate::config::ApiConfig;
use crate::errors::ApiError;
use crate::models::{ChatRequest, ChatResponse, ConversationHistory, HealthStatus, Pong};

use self::decoder::decode_text_stream;

/// HTTP client for the Raisket chat API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self::with_client(config, builder.build()?))
    }

    pub fn with_client(config: ApiConfig, client: Client) -> Self {
        Self { client, config }
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url())
    }

    /// Sends a chat message and waits for the complete answer.
    pub async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let req = self.client.post(self.url("/ai/chat")).json(request);
        self.fetch_json(req).await
    }

    /// Opens a streaming chat request and yields the answer text as it arrives.
    ///
    /// Setup failures (non-success status, no body) are returned before any
    /// text is produced. The returned stream is single-pass; dropping it
    /// aborts the request.
    pub async fn message_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = Result<String, ApiError>> + Send + 'static, ApiError> {
        let url = self.url("/ai/chat/stream");
        debug!("POST {url}");

        let resp = self.client.post(&url).json(request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            error!("Chat stream request to {url} failed with {status}");
            return Err(ApiError::StreamFailed { status });
        }
        if matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT) {
            error!("Chat stream request to {url} returned no body ({status})");
            return Err(ApiError::NoReader);
        }

        Ok(decode_text_stream(resp.bytes_stream()).map_err(ApiError::from))
    }

    /// Streams a chat answer into `on_chunk`, one call per decoded piece of
    /// text, in arrival order. Returns once the body is exhausted.
    ///
    /// A transport error mid-stream is returned and `on_chunk` is not called again.
    pub async fn stream_message(
        &self,
        request: &ChatRequest,
        mut on_chunk: impl FnMut(String),
    ) -> Result<(), ApiError> {
        let stream = self.message_stream(request).await?;
        let mut stream = std::pin::pin!(stream);

        let mut chunks = 0usize;
        while let Some(chunk) = stream.next().await {
            let text = chunk.inspect_err(|e| error!("Chat stream aborted after {chunks} chunks: {e}"))?;
            chunks += 1;
            on_chunk(text);
        }
        debug!("Chat stream finished after {chunks} chunks");
        Ok(())
    }

    /// Fetches the backend health payload as-is.
    pub async fn health_check(&self) -> Result<HealthStatus, ApiError> {
        self.fetch_json(self.client.get(self.url("/health"))).await
    }

    pub async fn ping(&self) -> Result<Pong, ApiError> {
        self.fetch_json(self.client.get(self.url("/ping"))).await
    }

    /// Fetches the stored turns of a conversation.
    pub async fn get_conversation(&self, conversation_id: &str) -> Result<ConversationHistory, ApiError> {
        let url = self.url_with_segments(&["ai", "conversations", conversation_id])?;
        self.fetch_json(self.client.get(url)).await
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url_with_segments(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let base = self.config.base_url();
        let invalid = || ApiError::InvalidUrl(base.to_string());
        let mut url = Url::parse(base).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let req = match self.config.timeout() {
            Some(timeout) => req.timeout(timeout),
            None => req,
        };
        let resp = req.send().await?;
        debug!("{} {}", resp.url(), resp.status());
        decode_json(resp).await
    }
}

async fn decode_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let url = resp.url().to_string();
        let body = resp.text().await.unwrap_or_default();
        error!("Request to {url} failed with {status}: {body}");
        return Err(ApiError::Status { status, body });
    }

    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        error!("Malformed response body: {e}");
        ApiError::Decode(e)
    })
}
