// src/cli/display.rs - Terminal rendering: themes, streamed replies, notices

use crossterm::cursor::MoveLeft;
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use std::io::Write;
use std::sync::RwLock;

use crate::core::notice::{Notice, NoticeLevel, NoticeSink};
use crate::core::{TokenCount, TurnDisplay};
use crate::infra::config::Theme;
use crate::provider::{Message, Role};

/// Drawn after the partial reply while it streams. Never stored.
pub const STREAM_CURSOR: &str = "▌";

/// Colors for one theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub user: Color,
    pub assistant: Color,
    pub system: Color,
    pub dim: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                user: Color::DarkBlue,
                assistant: Color::Black,
                system: Color::DarkMagenta,
                dim: Color::DarkGrey,
                success: Color::DarkGreen,
                warning: Color::DarkYellow,
                error: Color::DarkRed,
            },
            Theme::Dark => Self {
                user: Color::Cyan,
                assistant: Color::White,
                system: Color::Magenta,
                dim: Color::Grey,
                success: Color::Green,
                warning: Color::Yellow,
                error: Color::Red,
            },
        }
    }

    pub fn role(&self, role: Role) -> Color {
        match role {
            Role::User => self.user,
            Role::Assistant => self.assistant,
            Role::System => self.system,
        }
    }

    fn notice(&self, level: NoticeLevel) -> Color {
        match level {
            NoticeLevel::Info => self.dim,
            NoticeLevel::Success => self.success,
            NoticeLevel::Warning => self.warning,
            NoticeLevel::Error => self.error,
        }
    }
}

/// Prints a streaming reply in place: only the new suffix is written each
/// update, and the cursor glyph is erased before more text follows.
pub struct StreamPrinter<W: Write> {
    out: W,
    palette: Palette,
    printed: usize,
    cursor_shown: bool,
}

impl<W: Write> StreamPrinter<W> {
    pub fn new(out: W, palette: Palette) -> Self {
        Self {
            out,
            palette,
            printed: 0,
            cursor_shown: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn erase_cursor(&mut self) {
        if self.cursor_shown {
            let _ = queue!(self.out, MoveLeft(1), Clear(ClearType::UntilNewLine));
            self.cursor_shown = false;
        }
    }

    fn write_suffix(&mut self, text: &str) {
        if let Some(suffix) = text.get(self.printed..) {
            let _ = queue!(self.out, Print(suffix));
            self.printed = text.len();
        }
    }
}

impl<W: Write> TurnDisplay for StreamPrinter<W> {
    fn begin(&mut self) {
        self.printed = 0;
        self.cursor_shown = false;
        let _ = queue!(
            self.out,
            SetForegroundColor(self.palette.assistant),
            SetAttribute(Attribute::Bold),
            Print("assistant> "),
            SetAttribute(Attribute::NormalIntensity),
        );
        self.out.flush().ok();
    }

    fn update(&mut self, partial: &str) {
        self.erase_cursor();
        self.write_suffix(partial);
        let _ = queue!(self.out, Print(STREAM_CURSOR));
        self.cursor_shown = true;
        self.out.flush().ok();
    }

    fn finish(&mut self, full: &str) {
        self.erase_cursor();
        self.write_suffix(full);
        let _ = queue!(self.out, ResetColor, Print("\n"));
        self.out.flush().ok();
    }
}

/// Notice sink for the terminal. Writes to stderr in the current theme.
pub struct TerminalNotices {
    theme: RwLock<Theme>,
}

impl TerminalNotices {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme: RwLock::new(theme),
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme.read().map(|t| *t).unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) {
        if let Ok(mut t) = self.theme.write() {
            *t = theme;
        }
    }

    pub fn palette(&self) -> Palette {
        Palette::for_theme(self.theme())
    }
}

impl NoticeSink for TerminalNotices {
    fn notify(&self, notice: Notice) {
        let mut err = std::io::stderr();
        let _ = write_notice(&mut err, &self.palette(), &notice);
    }
}

fn notice_prefix(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "",
        NoticeLevel::Success => "[ok] ",
        NoticeLevel::Warning => "[warn] ",
        NoticeLevel::Error => "[error] ",
    }
}

pub fn write_notice<W: Write>(out: &mut W, palette: &Palette, notice: &Notice) -> std::io::Result<()> {
    queue!(
        out,
        SetForegroundColor(palette.notice(notice.level)),
        Print(format!("  {}{}", notice_prefix(notice.level), notice.text)),
        ResetColor,
        Print("\n"),
    )?;
    out.flush()
}

/// Print a message history the way it was displayed during the chat.
pub fn write_history<W: Write>(
    out: &mut W,
    palette: &Palette,
    messages: &[Message],
) -> std::io::Result<()> {
    for m in messages {
        queue!(
            out,
            SetForegroundColor(palette.role(m.role)),
            SetAttribute(Attribute::Bold),
            Print(format!("{}> ", m.role.as_str())),
            SetAttribute(Attribute::NormalIntensity),
            Print(&m.content),
            ResetColor,
            Print("\n"),
        )?;
    }
    out.flush()
}

pub fn format_usage(count: &TokenCount) -> String {
    format!(
        "Prompt tokens: {} | Completion tokens: {} | Total tokens: {}",
        count.prompt,
        count.completion,
        count.total()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(updates: &[&str], full: &str) -> String {
        let mut p = StreamPrinter::new(Vec::new(), Palette::for_theme(Theme::Dark));
        p.begin();
        for u in updates {
            p.update(u);
        }
        p.finish(full);
        String::from_utf8(p.into_inner()).unwrap()
    }

    #[test]
    fn test_stream_printer_writes_each_suffix_once() {
        let out = render(&["Hel", "Hello, ", "Hello, world"], "Hello, world");
        assert!(out.contains("assistant> "));
        assert_eq!(out.matches("Hel").count(), 1);
        assert_eq!(out.matches("lo, ").count(), 1);
        assert_eq!(out.matches("world").count(), 1);
        assert_eq!(out.matches(STREAM_CURSOR).count(), 3);
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_stream_printer_finish_without_updates() {
        let out = render(&[], "");
        assert!(!out.contains(STREAM_CURSOR));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_palettes_differ() {
        assert_ne!(Palette::for_theme(Theme::Light), Palette::for_theme(Theme::Dark));
    }

    #[test]
    fn test_terminal_notices_theme_switch() {
        let n = TerminalNotices::new(Theme::Light);
        assert_eq!(n.theme(), Theme::Light);
        n.set_theme(Theme::Dark);
        assert_eq!(n.palette(), Palette::for_theme(Theme::Dark));
    }

    #[test]
    fn test_write_notice_prefix() {
        let mut out = Vec::new();
        let notice = Notice::new(NoticeLevel::Error, "Error: boom");
        write_notice(&mut out, &Palette::for_theme(Theme::Light), &notice).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[error] Error: boom"));
    }

    #[test]
    fn test_write_history_labels_roles() {
        let mut out = Vec::new();
        write_history(
            &mut out,
            &Palette::for_theme(Theme::Light),
            &[Message::user("Explorer: hi"), Message::assistant("hello")],
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("user> "));
        assert!(text.contains("Explorer: hi"));
        assert!(text.contains("assistant> "));
    }

    #[test]
    fn test_format_usage() {
        let c = TokenCount {
            prompt: 120,
            completion: 30,
        };
        assert_eq!(
            format_usage(&c),
            "Prompt tokens: 120 | Completion tokens: 30 | Total tokens: 150"
        );
    }
}
