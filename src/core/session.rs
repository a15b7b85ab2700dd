// src/core/session.rs - Session state owned by the chat loop

use serde::{Deserialize, Serialize};

use crate::provider::{Message, TokenUsage};

pub const DEFAULT_USER_NAME: &str = "Explorer";

/// Running token totals for a session. Only ever grows until `clear`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    pub prompt: u64,
    pub completion: u64,
}

impl TokenCount {
    pub fn add(&mut self, usage: TokenUsage) {
        self.prompt = self.prompt.saturating_add(usage.input_tokens as u64);
        self.completion = self.completion.saturating_add(usage.output_tokens as u64);
    }

    pub fn total(&self) -> u64 {
        self.prompt.saturating_add(self.completion)
    }
}

/// Everything one interactive session remembers. Single owner, single writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    messages: Vec<Message>,
    token_count: TokenCount,
    pub user_name: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_USER_NAME)
    }
}

impl SessionState {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            token_count: TokenCount::default(),
            user_name: user_name.into(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn token_count(&self) -> TokenCount {
        self.token_count
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append the user's input, prefixed with their display name.
    pub fn push_user_input(&mut self, input: &str) -> &Message {
        let content = format!("{}: {}", self.user_name, input);
        self.messages.push(Message::user(content));
        &self.messages[self.messages.len() - 1]
    }

    pub fn record_usage(&mut self, usage: TokenUsage) {
        self.token_count.add(usage);
    }

    /// Swap in a loaded conversation. Token counters are left as they are.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Forget the conversation and zero both counters. Irreversible.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.token_count = TokenCount::default();
    }
}
