// src/core/controller.rs - One conversation turn: prompt, stream, finalize
//
// Idle -> Pending -> Streaming -> Finalize -> Idle. The session state is
// borrowed for the duration of a turn and never stored here.

use futures::StreamExt;
use std::sync::Arc;

use super::pacing::{Pacer, Pacing, StopSignal};
use super::prompt::PromptSettings;
use super::session::SessionState;
use crate::infra::config::UsagePolicy;
use crate::provider::{Backends, Message, ModelEntry, StreamEvent, TokenUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Pending,
    Streaming,
    Finalize,
}

/// Where a turn's reply is shown while it is being generated.
pub trait TurnDisplay {
    /// A reply is about to stream.
    fn begin(&mut self);
    /// Show the reply so far. Purely transient.
    fn update(&mut self, partial: &str);
    /// Show the final reply.
    fn finish(&mut self, full: &str);
}

/// What a finished turn produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnReport {
    /// Stored assistant text, `None` when no stream could be opened.
    pub reply: Option<String>,
    /// Tokens added to the session counters by this turn.
    pub usage: TokenUsage,
    pub cancelled: bool,
    /// Number of fragments received.
    pub fragments: usize,
}

pub struct SessionController {
    backends: Arc<Backends>,
    pub model: ModelEntry,
    pub settings: PromptSettings,
    pub pacing: Pacing,
    pub usage_policy: UsagePolicy,
    phase: TurnPhase,
}

impl SessionController {
    pub fn new(backends: Arc<Backends>, model: ModelEntry, settings: PromptSettings) -> Self {
        Self {
            backends,
            model,
            settings,
            pacing: Pacing::default(),
            usage_policy: UsagePolicy::default(),
            phase: TurnPhase::Idle,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_usage_policy(mut self, policy: UsagePolicy) -> Self {
        self.usage_policy = policy;
        self
    }

    pub fn backends(&self) -> &Arc<Backends> {
        &self.backends
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    fn enter(&mut self, phase: TurnPhase) {
        tracing::debug!("turn phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// The exact message list sent for the current history.
    pub fn outgoing_prompt(&self, state: &SessionState) -> Vec<Message> {
        self.settings.build(state.messages())
    }

    /// Run one turn for `input`, streaming into `display` until the backend
    /// finishes or `stop` fires.
    pub async fn run_turn(
        &mut self,
        state: &mut SessionState,
        input: &str,
        display: &mut dyn TurnDisplay,
        mut stop: StopSignal,
    ) -> TurnReport {
        self.enter(TurnPhase::Pending);
        state.push_user_input(input);
        let prompt = self.outgoing_prompt(state);

        self.enter(TurnPhase::Streaming);
        let Some(mut stream) = self.backends.stream(&prompt, &self.model).await else {
            self.enter(TurnPhase::Idle);
            return TurnReport::default();
        };

        display.begin();
        let mut pacer = Pacer::new(self.pacing);
        let mut reply = String::new();
        let mut stream_usage: Option<TokenUsage> = None;
        let mut fragments = 0usize;
        let mut cancelled = false;

        loop {
            let event = tokio::select! {
                biased;
                _ = stop.stopped() => {
                    cancelled = true;
                    break;
                }
                event = stream.next() => event,
            };

            match event {
                None => break,
                Some(StreamEvent::Fragment(text)) => {
                    fragments += 1;
                    reply.push_str(&text);

                    let wait = pacer.remaining();
                    if !wait.is_zero() {
                        tokio::select! {
                            biased;
                            _ = stop.stopped() => {
                                cancelled = true;
                                break;
                            }
                            _ = tokio::time::sleep(wait) => {}
                        }
                    }
                    display.update(&reply);
                    pacer.mark();
                }
                Some(StreamEvent::Usage(usage)) => stream_usage = Some(usage),
            }
        }
        drop(stream);

        self.enter(TurnPhase::Finalize);
        if cancelled {
            tracing::info!("turn stopped after {} fragment(s)", fragments);
        }
        display.finish(&reply);
        state.push(Message::assistant(reply.clone()));

        let usage = self.settle_usage(&prompt, stream_usage, cancelled).await;
        state.record_usage(usage);

        self.enter(TurnPhase::Idle);
        TurnReport {
            reply: Some(reply),
            usage,
            cancelled,
            fragments,
        }
    }

    /// Token counts for a finished stream under the configured policy.
    async fn settle_usage(
        &self,
        prompt: &[Message],
        stream_usage: Option<TokenUsage>,
        cancelled: bool,
    ) -> TokenUsage {
        if cancelled {
            return stream_usage.unwrap_or_default();
        }
        match (self.usage_policy, stream_usage) {
            (UsagePolicy::Stream, Some(usage)) => usage,
            // Second, non-streaming invocation of the same prompt, only for its counts.
            _ => self.backends.complete(prompt, &self.model).await.usage,
        }
    }
}
