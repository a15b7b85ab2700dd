// src/provider/ollama.rs - Ollama backend (locally served models)

use async_trait::async_trait;
use futures::StreamExt;

use super::{
    wire_messages, ChatChunk, ChatRequest, ChatResponse, ChunkStream, ModelProvider, TokenUsage,
};
use crate::infra::errors::GeoError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Ask the local service which models it has pulled.
    pub async fn probe(&self) -> Result<Vec<String>, GeoError> {
        let resp = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(std::time::Duration::from_secs(3))
            .send()
            .await
            .map_err(|e| provider_error(format!("Cannot reach Ollama: {}", e), false))?;

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| provider_error(format!("Invalid Ollama response: {}", e), false))?;

        let models: Vec<String> = body["models"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|m| m["name"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    fn request_body(request: &ChatRequest, stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "messages": wire_messages(&request.messages),
            "stream": stream,
        })
    }

    async fn post_chat(&self, body: &serde_json::Value) -> Result<reqwest::Response, GeoError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| provider_error(e.to_string(), e.is_timeout() || e.is_connect()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(provider_error(
                format!("HTTP {}: {}", status, error_body),
                status.is_server_error(),
            ));
        }
        Ok(response)
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

fn provider_error(message: impl Into<String>, retriable: bool) -> GeoError {
    GeoError::Provider {
        provider: "ollama".into(),
        message: message.into(),
        retriable,
    }
}

fn parse_usage(value: &serde_json::Value) -> TokenUsage {
    TokenUsage {
        input_tokens: value["prompt_eval_count"].as_u64().unwrap_or(0) as u32,
        output_tokens: value["eval_count"].as_u64().unwrap_or(0) as u32,
    }
}

/// Splits a byte stream into trimmed, non-empty lines. Bytes are buffered
/// raw since a network chunk may end inside a multi-byte character.
#[derive(Debug, Default)]
pub(crate) struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    /// Complete lines made available by `bytes`.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Whatever is left once the body has ended.
    pub(crate) fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buffer).trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}

/// Stream item for one line, and whether the stream ends after it.
fn line_step(line: &str) -> (Option<Result<ChatChunk, GeoError>>, bool) {
    match parse_ndjson_line(line) {
        Ok(NdjsonLine::Chunk(chunk)) => {
            let last = chunk.usage.is_some();
            (Some(Ok(chunk)), last)
        }
        Ok(NdjsonLine::Done(usage)) => (
            usage.map(|usage| {
                Ok(ChatChunk {
                    delta: String::new(),
                    usage: Some(usage),
                })
            }),
            true,
        ),
        Err(e) => (Some(Err(e)), true),
    }
}

/// What one NDJSON line of a chat stream means.
#[derive(Debug, PartialEq)]
pub(crate) enum NdjsonLine {
    Chunk(ChatChunk),
    Done(Option<TokenUsage>),
}

pub(crate) fn parse_ndjson_line(line: &str) -> Result<NdjsonLine, GeoError> {
    let parsed: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| provider_error(format!("Failed to parse NDJSON: {}", e), false))?;

    if let Some(err) = parsed["error"].as_str() {
        return Err(provider_error(err.to_string(), false));
    }

    if parsed["done"].as_bool().unwrap_or(false) {
        let usage = parse_usage(&parsed);
        let content = parsed["message"]["content"].as_str().unwrap_or("");
        if !content.is_empty() {
            // Final line may still carry text; keep it ahead of the usage summary.
            return Ok(NdjsonLine::Chunk(ChatChunk {
                delta: content.to_string(),
                usage: (!usage.is_empty()).then_some(usage),
            }));
        }
        return Ok(NdjsonLine::Done((!usage.is_empty()).then_some(usage)));
    }

    Ok(NdjsonLine::Chunk(ChatChunk {
        delta: parsed["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        usage: None,
    }))
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, GeoError> {
        let body = Self::request_body(&request, false);
        let response = self.post_chat(&body).await?;

        let resp: serde_json::Value = response
            .json()
            .await
            .map_err(|e| provider_error(format!("Failed to parse response: {}", e), false))?;

        let content = resp["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok(ChatResponse {
            content,
            usage: parse_usage(&resp),
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, GeoError> {
        let body = Self::request_body(&request, true);
        let response = self.post_chat(&body).await?;

        // NDJSON, one object per line; the `done: true` line carries the counts.
        let byte_stream = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut lines = LineSplitter::default();
            let mut byte_stream = std::pin::pin!(byte_stream);
            let mut finished = false;

            while !finished {
                let bytes = match byte_stream.next().await {
                    Some(Ok(b)) => b,
                    Some(Err(e)) => {
                        yield Err(provider_error(format!("Stream read error: {}", e), false));
                        finished = true;
                        break;
                    }
                    None => break,
                };

                for line in lines.push(&bytes) {
                    let (item, last) = line_step(&line);
                    if let Some(item) = item {
                        yield item;
                    }
                    if last {
                        finished = true;
                        break;
                    }
                }
            }

            // The last object may arrive without a trailing newline.
            if !finished {
                if let Some(line) = lines.finish() {
                    if let (Some(item), _) = line_step(&line) {
                        yield item;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
