// tests/controller_test.rs - Integration test: session controller with mock backends

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use geoexplorer::core::notice::CollectedNotices;
use geoexplorer::core::pacing::{stop_channel, Pacing, StopHandle, StopSignal};
use geoexplorer::core::prompt::PromptSettings;
use geoexplorer::core::{SessionController, SessionState, TokenCount, TurnDisplay, TurnPhase};
use geoexplorer::infra::config::UsagePolicy;
use geoexplorer::infra::errors::GeoError;
use geoexplorer::provider::*;

/// A mock backend that streams canned fragments without any network calls.
struct ScriptedProvider {
    fragments: Vec<&'static str>,
    stream_usage: Option<TokenUsage>,
    chat_usage: TokenUsage,
    fail_open: bool,
    /// Keep the stream open after the last fragment.
    hang: bool,
    chat_calls: AtomicU32,
    stream_calls: AtomicU32,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    fn new(fragments: &[&'static str]) -> Self {
        Self {
            fragments: fragments.to_vec(),
            stream_usage: None,
            chat_usage: TokenUsage::new(100, 50),
            fail_open: false,
            hang: false,
            chat_calls: AtomicU32::new(0),
            stream_calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn with_stream_usage(mut self, usage: TokenUsage) -> Self {
        self.stream_usage = Some(usage);
        self
    }

    fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    fn chat_calls(&self) -> u32 {
        self.chat_calls.load(Ordering::SeqCst)
    }

    fn stream_calls(&self) -> u32 {
        self.stream_calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> ChatRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, GeoError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        Ok(ChatResponse {
            content: self.fragments.concat(),
            usage: self.chat_usage,
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, GeoError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if self.fail_open {
            return Err(GeoError::Provider {
                provider: "scripted".into(),
                message: "connection refused".into(),
                retriable: true,
            });
        }

        let mut items: Vec<Result<ChatChunk, GeoError>> = self
            .fragments
            .iter()
            .map(|f| {
                Ok(ChatChunk {
                    delta: f.to_string(),
                    usage: None,
                })
            })
            .collect();
        if let Some(usage) = self.stream_usage {
            items.push(Ok(ChatChunk {
                delta: String::new(),
                usage: Some(usage),
            }));
        }

        let stream = futures::stream::iter(items);
        if self.hang {
            Ok(Box::pin(stream.chain(futures::stream::pending())))
        } else {
            Ok(Box::pin(stream))
        }
    }
}

/// Records every display call; optionally stops the turn on the first update.
#[derive(Default)]
struct RecordingDisplay {
    begins: u32,
    updates: Vec<String>,
    finished: Option<String>,
    stop_on_update: Option<StopHandle>,
}

impl TurnDisplay for RecordingDisplay {
    fn begin(&mut self) {
        self.begins += 1;
    }

    fn update(&mut self, partial: &str) {
        self.updates.push(partial.to_string());
        if let Some(handle) = self.stop_on_update.take() {
            handle.stop();
        }
    }

    fn finish(&mut self, full: &str) {
        self.finished = Some(full.to_string());
    }
}

fn controller(
    hosted: Option<Arc<ScriptedProvider>>,
    local: Arc<ScriptedProvider>,
    model: &str,
) -> (SessionController, Arc<CollectedNotices>) {
    let notices = Arc::new(CollectedNotices::new());
    let backends = Backends::new(
        hosted.map(|h| h as Arc<dyn ModelProvider>),
        local as Arc<dyn ModelProvider>,
        notices.clone(),
    );
    let c = SessionController::new(
        Arc::new(backends),
        ModelEntry::from_id(model),
        PromptSettings::default(),
    )
    .with_pacing(Pacing::none());
    (c, notices)
}

#[tokio::test]
async fn test_fragments_accumulate_into_one_reply() {
    let local = Arc::new(
        ScriptedProvider::new(&["Hel", "lo, ", "world"]).with_stream_usage(TokenUsage::new(12, 3)),
    );
    let (mut c, notices) = controller(None, local.clone(), "llama3.1:8b");
    let mut state = SessionState::new("Explorer");
    let mut display = RecordingDisplay::default();

    let report = c
        .run_turn(&mut state, "Hi", &mut display, StopSignal::never())
        .await;

    assert_eq!(report.reply.as_deref(), Some("Hello, world"));
    assert_eq!(report.fragments, 3);
    assert!(!report.cancelled);
    assert_eq!(display.begins, 1);
    assert_eq!(display.updates, vec!["Hel", "Hello, ", "Hello, world"]);
    assert_eq!(display.finished.as_deref(), Some("Hello, world"));

    assert_eq!(
        state.messages(),
        &[Message::user("Explorer: Hi"), Message::assistant("Hello, world")]
    );
    assert!(state.messages().iter().all(|m| !m.content.contains('▌')));
    assert_eq!(
        state.token_count(),
        TokenCount {
            prompt: 12,
            completion: 3
        }
    );
    assert_eq!(local.chat_calls(), 0);
    assert_eq!(c.phase(), TurnPhase::Idle);
    assert!(notices.all().is_empty());
}

#[tokio::test]
async fn test_outgoing_prompt_is_system_then_history() {
    let local = Arc::new(ScriptedProvider::new(&["Lima."]).with_stream_usage(TokenUsage::new(1, 1)));
    let (mut c, _) = controller(None, local.clone(), "gemma2:2b");
    let mut state = SessionState::new("Ana");

    c.run_turn(
        &mut state,
        "Capital of Peru?",
        &mut RecordingDisplay::default(),
        StopSignal::never(),
    )
    .await;
    c.run_turn(
        &mut state,
        "And Chile?",
        &mut RecordingDisplay::default(),
        StopSignal::never(),
    )
    .await;

    let req = local.last_request();
    assert_eq!(req.model, "gemma2:2b");
    assert_eq!(req.messages.len(), 5);
    assert_eq!(req.messages[0].role, Role::System);
    assert!(req.messages[0]
        .content
        .contains("Focus on the following geography topics: "));
    assert_eq!(req.messages[1].role, Role::System);
    assert_eq!(&req.messages[2..], &[
        Message::user("Ana: Capital of Peru?"),
        Message::assistant("Lima."),
        Message::user("Ana: And Chile?"),
    ]);
}

#[tokio::test]
async fn test_routes_by_model_prefix() {
    let hosted = Arc::new(ScriptedProvider::new(&["hosted"]).with_stream_usage(TokenUsage::new(1, 1)));
    let local = Arc::new(ScriptedProvider::new(&["local"]).with_stream_usage(TokenUsage::new(1, 1)));
    let (mut c, _) = controller(Some(hosted.clone()), local.clone(), "gpt-4o-mini");
    let mut state = SessionState::default();

    let r = c
        .run_turn(&mut state, "a", &mut RecordingDisplay::default(), StopSignal::never())
        .await;
    assert_eq!(r.reply.as_deref(), Some("hosted"));

    c.model = ModelEntry::from_id("phi3:latest");
    let r = c
        .run_turn(&mut state, "b", &mut RecordingDisplay::default(), StopSignal::never())
        .await;
    assert_eq!(r.reply.as_deref(), Some("local"));

    assert_eq!(hosted.stream_calls(), 1);
    assert_eq!(local.stream_calls(), 1);
}

#[tokio::test]
async fn test_recount_policy_issues_second_call() {
    let local = Arc::new(ScriptedProvider::new(&["Andes"]).with_stream_usage(TokenUsage::new(9, 9)));
    let (c, _) = controller(None, local.clone(), "llama3.1:8b");
    let mut c = c.with_usage_policy(UsagePolicy::Recount);
    let mut state = SessionState::default();

    let report = c
        .run_turn(&mut state, "Longest range?", &mut RecordingDisplay::default(), StopSignal::never())
        .await;

    assert_eq!(local.chat_calls(), 1);
    assert_eq!(report.usage, TokenUsage::new(100, 50));
    assert_eq!(state.token_count().total(), 150);
    // The recount reuses the exact prompt the stream was opened with.
    let requests = local.requests.lock().unwrap();
    assert_eq!(requests[0].messages, requests[1].messages);
}

#[tokio::test]
async fn test_stream_policy_recounts_when_stream_reports_no_usage() {
    let local = Arc::new(ScriptedProvider::new(&["Nile"]));
    let (mut c, _) = controller(None, local.clone(), "llama3.1:8b");
    let mut state = SessionState::default();

    c.run_turn(&mut state, "Longest river?", &mut RecordingDisplay::default(), StopSignal::never())
        .await;

    assert_eq!(local.chat_calls(), 1);
    assert_eq!(
        state.token_count(),
        TokenCount {
            prompt: 100,
            completion: 50
        }
    );
}

#[tokio::test]
async fn test_counters_grow_until_clear() {
    let local = Arc::new(ScriptedProvider::new(&["ok"]).with_stream_usage(TokenUsage::new(10, 2)));
    let (mut c, _) = controller(None, local, "llama3.1:8b");
    let mut state = SessionState::default();

    let mut last = state.token_count();
    for input in ["one", "two", "three"] {
        c.run_turn(&mut state, input, &mut RecordingDisplay::default(), StopSignal::never())
            .await;
        let now = state.token_count();
        assert!(now.prompt >= last.prompt && now.completion >= last.completion);
        last = now;
    }
    assert_eq!(last.total(), 36);
    assert_eq!(state.messages().len(), 6);

    state.clear();
    assert!(state.messages().is_empty());
    assert_eq!(state.token_count(), TokenCount::default());
}

#[tokio::test]
async fn test_stop_keeps_partial_reply_without_recount() {
    let local = Arc::new(ScriptedProvider::new(&["Par", "tial"]).hanging());
    let (mut c, _) = controller(None, local.clone(), "llama3.1:8b");
    let mut state = SessionState::default();

    let (handle, signal) = stop_channel();
    let mut display = RecordingDisplay {
        stop_on_update: Some(handle),
        ..Default::default()
    };

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        c.run_turn(&mut state, "Tell me about Greenland", &mut display, signal),
    )
    .await
    .expect("stopped turn should end promptly");

    assert!(report.cancelled);
    assert_eq!(report.reply.as_deref(), Some("Par"));
    assert_eq!(display.finished.as_deref(), Some("Par"));
    assert_eq!(state.messages().last(), Some(&Message::assistant("Par")));
    assert_eq!(state.token_count(), TokenCount::default());
    assert_eq!(local.chat_calls(), 0);
}

#[tokio::test]
async fn test_failed_open_adds_no_answer() {
    let local = Arc::new(ScriptedProvider::new(&[]).failing_open());
    let (mut c, notices) = controller(None, local.clone(), "llama3.1:8b");
    let mut state = SessionState::default();
    let mut display = RecordingDisplay::default();

    let report = c
        .run_turn(&mut state, "Hi", &mut display, StopSignal::never())
        .await;

    assert!(report.reply.is_none());
    assert_eq!(state.messages(), &[Message::user("Explorer: Hi")]);
    assert_eq!(state.token_count(), TokenCount::default());
    assert_eq!(display.begins, 0);
    assert_eq!(local.chat_calls(), 0);
    assert_eq!(notices.errors().len(), 1);
    assert!(notices.errors()[0].contains("connection refused"));
    assert_eq!(c.phase(), TurnPhase::Idle);
}

#[tokio::test]
async fn test_hosted_model_without_key_reports_notice() {
    let local = Arc::new(ScriptedProvider::new(&["never"]));
    let (mut c, notices) = controller(None, local.clone(), "gpt-4o");
    let mut state = SessionState::default();

    let report = c
        .run_turn(&mut state, "Hi", &mut RecordingDisplay::default(), StopSignal::never())
        .await;

    assert!(report.reply.is_none());
    assert_eq!(local.stream_calls(), 0);
    assert!(notices.errors()[0].contains("OPENAI_API_KEY"));
}

#[tokio::test]
async fn test_pacing_spaces_display_updates() {
    let local = Arc::new(ScriptedProvider::new(&["a", "b", "c"]).with_stream_usage(TokenUsage::new(1, 1)));
    let (c, _) = controller(None, local, "llama3.1:8b");
    let mut c = c.with_pacing(Pacing::new(Duration::from_millis(30)));
    let mut state = SessionState::default();
    let mut display = RecordingDisplay::default();

    let started = std::time::Instant::now();
    c.run_turn(&mut state, "x", &mut display, StopSignal::never())
        .await;

    assert_eq!(display.updates, vec!["a", "ab", "abc"]);
    assert!(started.elapsed() >= Duration::from_millis(60));
}
