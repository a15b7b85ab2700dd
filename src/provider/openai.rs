// src/provider/openai.rs - OpenAI Chat Completions backend (hosted)

use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};

use super::{
    wire_messages, ChatChunk, ChatRequest, ChatResponse, ChunkStream, ModelProvider, TokenUsage,
};
use crate::infra::errors::GeoError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIProvider {
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build from `OPENAI_API_KEY`. Returns `None` when the key is unset or blank.
    pub fn from_env(base_url: &str) -> Option<Self> {
        let key = std::env::var("OPENAI_API_KEY").ok()?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::with_base_url(key.to_string(), base_url.to_string()))
    }

    fn request_body(request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": wire_messages(&request.messages),
        });
        if stream {
            body["stream"] = serde_json::json!(true);
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        body
    }
}

fn provider_error(message: impl Into<String>, retriable: bool) -> GeoError {
    GeoError::Provider {
        provider: "openai".into(),
        message: message.into(),
        retriable,
    }
}

/// Usage block of a completion body, if present.
fn parse_usage(value: &serde_json::Value) -> Option<TokenUsage> {
    let usage = value.get("usage")?;
    if !usage.is_object() {
        return None;
    }
    Some(TokenUsage {
        input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
    })
}

/// Error for a non-success HTTP status. 429 becomes `RateLimited`.
async fn status_error(status: reqwest::StatusCode, response: reqwest::Response) -> GeoError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return GeoError::RateLimited {
            provider: "openai".into(),
            retry_after_ms: 5000,
        };
    }
    let body = response.text().await.unwrap_or_default();
    provider_error(
        format!("HTTP {}: {}", status, body.trim()),
        status.is_server_error(),
    )
}

/// Map a failure seen before the first event arrived.
async fn open_error(err: reqwest_eventsource::Error) -> GeoError {
    use reqwest_eventsource::Error as EsError;
    match err {
        EsError::InvalidStatusCode(status, response) => status_error(status, response).await,
        EsError::InvalidContentType(content_type, _) => provider_error(
            format!(
                "Unexpected content type: {}",
                content_type.to_str().unwrap_or("<binary>")
            ),
            false,
        ),
        EsError::Transport(e) => provider_error(e.to_string(), e.is_timeout() || e.is_connect()),
        other => provider_error(format!("Cannot open event stream: {}", other), false),
    }
}

/// What one SSE message means for the chunk stream.
enum SseStep {
    Chunk(ChatChunk),
    Skip,
    Done,
}

fn sse_step(data: &str) -> Result<SseStep, GeoError> {
    if data == "[DONE]" {
        return Ok(SseStep::Done);
    }
    let chunk = parse_stream_data(data)?;
    if chunk.delta.is_empty() && chunk.usage.is_none() {
        Ok(SseStep::Skip)
    } else {
        Ok(SseStep::Chunk(chunk))
    }
}

/// Turn one SSE data payload into a chunk. A missing `delta.content` becomes "".
pub(crate) fn parse_stream_data(data: &str) -> Result<ChatChunk, GeoError> {
    let parsed: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| provider_error(format!("Failed to parse SSE data: {}", e), false))?;

    let delta = parsed["choices"][0]["delta"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();

    Ok(ChatChunk {
        delta,
        usage: parse_usage(&parsed),
    })
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, GeoError> {
        let body = Self::request_body(&request, false);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| provider_error(e.to_string(), e.is_timeout() || e.is_connect()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response).await);
        }

        let resp: serde_json::Value = response
            .json()
            .await
            .map_err(|e| provider_error(format!("Failed to parse response: {}", e), false))?;

        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok(ChatResponse {
            content,
            usage: parse_usage(&resp).unwrap_or_default(),
        })
    }

    /// Resolves once the server has accepted the request. A refused key or an
    /// unreachable host is an `Err`.
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, GeoError> {
        let body = Self::request_body(&request, true);

        let mut es = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .eventsource()
            .map_err(|e| provider_error(format!("Cannot open event stream: {}", e), false))?;

        let mut pending = None;
        loop {
            match es.next().await {
                Some(Ok(Event::Open)) => break,
                Some(Ok(Event::Message(msg))) => {
                    pending = Some(msg.data);
                    break;
                }
                Some(Err(e)) => {
                    es.close();
                    return Err(open_error(e).await);
                }
                None => {
                    return Err(provider_error("Event stream closed before opening", true));
                }
            }
        }

        Ok(Box::pin(sse_chunks(es, pending)))
    }
}

/// Chunks of an opened event stream. `pending` is a message read while opening.
fn sse_chunks(
    mut es: EventSource,
    pending: Option<String>,
) -> impl futures::Stream<Item = Result<ChatChunk, GeoError>> + Send {
    async_stream::stream! {
        let mut finished = false;
        if let Some(data) = pending {
            match sse_step(&data) {
                Ok(SseStep::Chunk(chunk)) => {
                    yield Ok(chunk);
                }
                Ok(SseStep::Skip) => {}
                Ok(SseStep::Done) => finished = true,
                Err(e) => {
                    yield Err(e);
                    finished = true;
                }
            }
        }

        while !finished {
            match es.next().await {
                None | Some(Err(reqwest_eventsource::Error::StreamEnded)) => break,
                Some(Ok(Event::Open)) => {}
                Some(Ok(Event::Message(msg))) => match sse_step(&msg.data) {
                    Ok(SseStep::Chunk(chunk)) => {
                        yield Ok(chunk);
                    }
                    Ok(SseStep::Skip) => {}
                    Ok(SseStep::Done) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                },
                Some(Err(e)) => {
                    yield Err(provider_error(format!("SSE stream error: {}", e), false));
                    break;
                }
            }
        }
        es.close();
    }
}
