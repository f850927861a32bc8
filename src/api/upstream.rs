//! Blocking upstream client for streaming chat completions.
//!
//! The response body of a blocking `reqwest` call is an [`std::io::Read`],
//! which plugs straight into the pull-based decode pipeline.

use crate::api::models::{
    ChatCompletionChunk, ChatCompletionRequest, ConciseChunk, STREAM_MODE_CONCISE,
};
use crate::core::config::AppConfig;
use crate::core::error::{AppError, Result};
use crate::stream::{EventStream, FrameDecoder};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error as _;
use std::time::Duration;

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Typed chunk stream over a live HTTP response body.
pub type ChunkStream<T> = EventStream<T, Response>;

/// Client for the concise Perplexity endpoint and OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    perplexity_url: String,
    supported_models: Vec<String>,
    max_line_bytes: usize,
}

impl UpstreamClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let upstream = &config.upstream;
        let http = Client::builder()
            .danger_accept_invalid_certs(!upstream.verify_ssl)
            .timeout(Duration::from_secs(upstream.request_timeout_secs))
            .connect_timeout(Duration::from_secs(upstream.connect_timeout_secs))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            perplexity_url: upstream.perplexity_url.clone(),
            supported_models: upstream.supported_models.clone(),
            max_line_bytes: config.stream.max_line_bytes,
        })
    }

    pub fn perplexity_url(&self) -> &str {
        &self.perplexity_url
    }

    pub fn supports_model(&self, model: &str) -> bool {
        self.supported_models.iter().any(|m| m == model)
    }

    /// Open a concise-mode stream against the configured Perplexity endpoint.
    ///
    /// Streaming is forced on and the model must be one of the configured
    /// supported models.
    pub fn stream_concise(
        &self,
        token: &str,
        mut request: ChatCompletionRequest,
    ) -> Result<ChunkStream<ConciseChunk>> {
        if !self.supports_model(&request.model) {
            return Err(AppError::UnsupportedModel(request.model));
        }

        request.stream = true;
        request.stream_mode = Some(STREAM_MODE_CONCISE.to_string());

        self.open_stream(&self.perplexity_url, token, &request)
    }

    /// Open a stream against `{base_url}/chat/completions`.
    pub fn stream_chat_completions(
        &self,
        base_url: &str,
        token: &str,
        mut request: ChatCompletionRequest,
    ) -> Result<ChunkStream<ChatCompletionChunk>> {
        request.stream = true;
        request.stream_mode = None;

        let url = chat_completions_url(base_url);
        self.open_stream(&url, token, &request)
    }

    fn open_stream<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChunkStream<T>> {
        validate_request(token, request)?;

        tracing::debug!(
            url = %url,
            model = %request.model,
            messages = request.messages.len(),
            "Opening upstream stream"
        );

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .map_err(|e| {
                tracing::error!(
                    url = %url,
                    model = %request.model,
                    error = %e,
                    error_source = ?e.source(),
                    is_timeout = e.is_timeout(),
                    is_connect = e.is_connect(),
                    "HTTP request failed to upstream"
                );
                AppError::from(e)
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(read_status_error(response));
        }

        tracing::debug!(url = %url, status = %status, "Upstream stream opened");

        let decoder = FrameDecoder::with_max_line_bytes(response, self.max_line_bytes);
        Ok(EventStream::new(decoder))
    }
}

fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn validate_request(token: &str, request: &ChatCompletionRequest) -> Result<()> {
    if token.trim().is_empty() {
        return Err(AppError::BadRequest("missing upstream token".to_string()));
    }
    if request.messages.is_empty() {
        return Err(AppError::BadRequest("messages must not be empty".to_string()));
    }
    if let Some(index) = request.first_blank_message() {
        return Err(AppError::BadRequest(format!(
            "message {} has empty content",
            index
        )));
    }
    Ok(())
}

/// Turn a non-200 response into an error carrying its status and body.
fn read_status_error(response: Response) -> AppError {
    let status = response.status().as_u16();
    let raw_text = match response.text() {
        Ok(text) => text,
        Err(error) => format!("Failed to read response: {}", error),
    };

    let message = serde_json::from_str::<Value>(&raw_text)
        .ok()
        .as_ref()
        .and_then(extract_error_message);

    tracing::warn!(
        status = status,
        error_message = message.as_deref().unwrap_or(""),
        "Upstream returned error status"
    );

    AppError::UpstreamStatus {
        status,
        body: truncate_message(&raw_text),
    }
}

fn truncate_message(message: &str) -> String {
    let mut chars = message.chars();
    let truncated: String = chars.by_ref().take(MAX_ERROR_MESSAGE_LEN).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Extract canonical error message from an upstream error payload.
pub fn extract_error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
        .or_else(|| {
            body.get("error")
                .and_then(|e| e.as_str())
                .map(|s| s.to_string())
        })
        .or_else(|| {
            body.get("message")
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
}
