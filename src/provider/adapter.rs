// src/provider/adapter.rs - Backend dispatch and stream normalization
//
// Picks the hosted or local client from a model entry's backend tag and
// folds every failure into a notice. Callers see "no answer, zero cost"
// instead of an error.

use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;

use super::catalog::{BackendKind, ModelEntry};
use super::ollama::OllamaProvider;
use super::openai::OpenAIProvider;
use super::{ChatRequest, ChunkStream, Message, ModelProvider, TokenUsage};
use crate::core::notice::NoticeSink;
use crate::infra::config::ProvidersConfig;
use crate::infra::errors::GeoError;

/// Uniform item of a normalized response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Next piece of generated text. Never empty.
    Fragment(String),
    /// Token counts reported by the backend, usually at the end.
    Usage(TokenUsage),
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Result of a non-streaming call. `content` is `None` when the call failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: Option<String>,
    pub usage: TokenUsage,
}

impl Completion {
    pub fn failed() -> Self {
        Self::default()
    }
}

/// The two backend clients behind one call surface.
pub struct Backends {
    hosted: Option<Arc<dyn ModelProvider>>,
    local: Arc<dyn ModelProvider>,
    notices: Arc<dyn NoticeSink>,
}

impl Backends {
    /// `hosted` is `None` when no API key is configured; calls routed to it then fail softly.
    pub fn new(
        hosted: Option<Arc<dyn ModelProvider>>,
        local: Arc<dyn ModelProvider>,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        Self {
            hosted,
            local,
            notices,
        }
    }

    /// Build both clients from config and the environment. Also returns the
    /// models the local service reports; an unreachable service reports none.
    pub async fn discover(
        config: &ProvidersConfig,
        notices: Arc<dyn NoticeSink>,
    ) -> (Self, Vec<String>) {
        let hosted = OpenAIProvider::from_env(&config.openai_base_url)
            .map(|p| Arc::new(p) as Arc<dyn ModelProvider>);
        if hosted.is_none() {
            tracing::info!("OPENAI_API_KEY not set; gpt-* models are unavailable");
        }

        let ollama = OllamaProvider::new(Some(config.ollama_base_url.clone()));
        let local_models = match ollama.probe().await {
            Ok(models) => {
                tracing::debug!("ollama reports {} model(s)", models.len());
                models
            }
            Err(e) => {
                tracing::debug!("ollama probe failed: {}", e);
                Vec::new()
            }
        };

        (Self::new(hosted, Arc::new(ollama), notices), local_models)
    }

    pub fn has_hosted(&self) -> bool {
        self.hosted.is_some()
    }

    /// The client that serves `kind`.
    pub fn provider_for(&self, kind: BackendKind) -> Result<&Arc<dyn ModelProvider>, GeoError> {
        match kind {
            BackendKind::Hosted => self.hosted.as_ref().ok_or_else(|| GeoError::NoProvider {
                backend: "hosted".into(),
                hint: "Set OPENAI_API_KEY to use gpt-* models.".into(),
            }),
            BackendKind::Local => Ok(&self.local),
        }
    }

    /// Single-shot call. Failures become an error notice and an empty completion.
    pub async fn complete(&self, messages: &[Message], model: &ModelEntry) -> Completion {
        let provider = match self.provider_for(model.backend) {
            Ok(p) => p,
            Err(e) => {
                self.report(&e);
                return Completion::failed();
            }
        };

        tracing::debug!("complete via {} ({} messages)", model, messages.len());

        match provider
            .chat(ChatRequest::new(model.id.clone(), messages.to_vec()))
            .await
        {
            Ok(resp) => Completion {
                content: Some(resp.content),
                usage: resp.usage,
            },
            Err(e) => {
                self.report(&e);
                Completion::failed()
            }
        }
    }

    /// Streaming call. `None` means the stream could not be opened (already reported).
    pub async fn stream(&self, messages: &[Message], model: &ModelEntry) -> Option<FragmentStream> {
        let provider = match self.provider_for(model.backend) {
            Ok(p) => p,
            Err(e) => {
                self.report(&e);
                return None;
            }
        };

        tracing::debug!("stream via {} ({} messages)", model, messages.len());

        match provider
            .chat_stream(ChatRequest::new(model.id.clone(), messages.to_vec()))
            .await
        {
            Ok(chunks) => Some(normalize(chunks, self.notices.clone())),
            Err(e) => {
                self.report(&e);
                None
            }
        }
    }

    fn report(&self, err: &GeoError) {
        tracing::warn!(retriable = err.is_retriable(), "backend call failed: {}", err);
        self.notices.error(&format!("Error: {}", err));
    }
}

/// Flatten backend chunks into fragments and usage. An error ends the stream after a notice.
fn normalize(mut chunks: ChunkStream, notices: Arc<dyn NoticeSink>) -> FragmentStream {
    let stream = async_stream::stream! {
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    if !chunk.delta.is_empty() {
                        yield StreamEvent::Fragment(chunk.delta);
                    }
                    if let Some(usage) = chunk.usage {
                        yield StreamEvent::Usage(usage);
                    }
                }
                Err(e) => {
                    tracing::warn!("stream interrupted: {}", e);
                    notices.error(&format!("Error: {}", e));
                    break;
                }
            }
        }
    };
    Box::pin(stream)
}
