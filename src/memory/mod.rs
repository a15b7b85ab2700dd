// src/memory/mod.rs - Conversation persistence

pub mod conversations;

pub use conversations::{load, load_file, ConversationRecord, ConversationStore};
