// src/core/notice.rs - Inline user-visible notices
//
// Backend and file failures are absorbed where they happen and reported
// through a sink instead of being returned to the caller.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Receives notices for display.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);

    fn info(&self, text: &str) {
        self.notify(Notice::new(NoticeLevel::Info, text));
    }

    fn success(&self, text: &str) {
        self.notify(Notice::new(NoticeLevel::Success, text));
    }

    fn warning(&self, text: &str) {
        self.notify(Notice::new(NoticeLevel::Warning, text));
    }

    fn error(&self, text: &str) {
        self.notify(Notice::new(NoticeLevel::Error, text));
    }
}

/// Sink that keeps every notice in memory.
#[derive(Debug, Default)]
pub struct CollectedNotices {
    notices: Mutex<Vec<Notice>>,
}

impl CollectedNotices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.of_level(NoticeLevel::Error)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.of_level(NoticeLevel::Warning)
    }

    fn of_level(&self, level: NoticeLevel) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|n| n.level == level)
            .map(|n| n.text)
            .collect()
    }
}

impl NoticeSink for CollectedNotices {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}
