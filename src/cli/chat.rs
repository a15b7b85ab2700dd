// src/cli/chat.rs - Interactive REPL

use inquire::InquireError;
use std::path::PathBuf;
use std::sync::Arc;

use super::commands::{SlashCommand, HELP};
use super::display::{self, StreamPrinter, TerminalNotices};
use super::history::{record_label, resolve_upload_path};
use crate::core::notice::NoticeSink;
use crate::core::pacing::InterruptRouter;
use crate::core::prompt::{self, PromptSettings, DEFAULT_INSTRUCTIONS};
use crate::core::{SessionController, SessionState};
use crate::infra::config::Theme;
use crate::memory::{load_file, ConversationRecord, ConversationStore};
use crate::provider::catalog::{self, BackendKind, ModelEntry};

/// Everything the REPL needs besides the controller and session.
pub struct ChatContext {
    pub notices: Arc<TerminalNotices>,
    /// Models offered by `/model`, hosted first.
    pub catalog: Vec<ModelEntry>,
    pub store: ConversationStore,
    pub default_save_name: String,
}

struct ChatSession {
    controller: SessionController,
    state: SessionState,
    ctx: ChatContext,
    interrupts: InterruptRouter,
}

/// Run the interactive chat REPL until `/quit` or end of input.
pub async fn run_chat(
    controller: SessionController,
    state: SessionState,
    ctx: ChatContext,
) -> anyhow::Result<()> {
    eprintln!(
        "geoexplorer v{} | {} | theme: {} | you are {}",
        env!("CARGO_PKG_VERSION"),
        controller.model,
        ctx.notices.theme(),
        state.user_name,
    );
    eprintln!("Ask about any place on Earth. /help lists commands, Ctrl-C stops a reply or exits.\n");

    let interrupts = InterruptRouter::new();
    let listener = spawn_interrupt_listener(interrupts.clone());
    let mut session = ChatSession {
        controller,
        state,
        ctx,
        interrupts,
    };

    while let Some(input) = read_input() {
        let trimmed = input.trim();

        if trimmed == "quit" || trimmed == "exit" {
            break;
        }

        if let Some(cmd) = SlashCommand::parse(trimmed) {
            if !session.handle_slash_command(cmd) {
                break;
            }
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        session.turn(trimmed).await;
    }

    listener.abort();
    eprintln!(
        "\nSession total: {}",
        display::format_usage(&session.state.token_count())
    );
    Ok(())
}

/// Ctrl-C stops the reply in progress. At the input prompt it ends the program.
fn spawn_interrupt_listener(router: InterruptRouter) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !router.interrupt() {
                eprintln!();
                std::process::exit(130);
            }
        }
    })
}

fn read_input() -> Option<String> {
    use std::io::{self, BufRead, Write};

    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    match stdin.lock().read_line(&mut line) {
        Ok(0) => None, // EOF
        Ok(_) => Some(line),
        Err(_) => None,
    }
}

/// Interactive model picker, starting on `current`.
pub fn pick_model(catalog: &[ModelEntry], current: &ModelEntry) -> Result<ModelEntry, InquireError> {
    let start = catalog.iter().position(|m| m == current).unwrap_or(0);
    inquire::Select::new("Select a model:", catalog.to_vec())
        .with_help_message("Use arrow keys to browse, type to filter")
        .with_starting_cursor(start)
        .with_page_size(12)
        .prompt()
}

impl ChatSession {
    async fn turn(&mut self, input: &str) {
        let signal = self.interrupts.arm();
        let mut printer = StreamPrinter::new(std::io::stdout(), self.ctx.notices.palette());
        let report = self
            .controller
            .run_turn(&mut self.state, input, &mut printer, signal)
            .await;
        self.interrupts.disarm();

        if report.cancelled {
            self.ctx.notices.info("Stopped.");
        }
        if report.reply.is_some() {
            self.ctx
                .notices
                .info(&display::format_usage(&self.state.token_count()));
        }
    }

    /// Returns false when the session should end.
    fn handle_slash_command(&mut self, cmd: SlashCommand) -> bool {
        match cmd {
            SlashCommand::Model(arg) => self.model_command(arg),
            SlashCommand::Instructions(arg) => self.instructions_command(arg),
            SlashCommand::Topics(arg) => self.topics_command(arg),
            SlashCommand::Theme(arg) => self.theme_command(arg),
            SlashCommand::Name(arg) => match arg {
                None => eprintln!("  Name: {}", self.state.user_name),
                Some(name) => {
                    self.state.user_name = name;
                    eprintln!("  Name set to {}", self.state.user_name);
                }
            },
            SlashCommand::Clear => {
                self.state.clear();
                self.ctx.notices.success("Chat history cleared.");
            }
            SlashCommand::Save(arg) => self.save_command(arg),
            SlashCommand::Load { path, index } => self.load_command(path, index),
            SlashCommand::Tokens => {
                eprintln!("  {}", display::format_usage(&self.state.token_count()));
            }
            SlashCommand::Status => self.print_status(),
            SlashCommand::Help => {
                eprintln!("Slash commands:");
                for (usage, what) in HELP {
                    eprintln!("  {:<28} {}", usage, what);
                }
            }
            SlashCommand::Quit => return false,
            SlashCommand::Unknown(cmd) => {
                eprintln!("Unknown command: {}. Type /help for commands.", cmd);
            }
        }
        true
    }

    fn model_command(&mut self, arg: Option<String>) {
        let entry = match arg {
            None => match pick_model(&self.ctx.catalog, &self.controller.model) {
                Ok(entry) => entry,
                Err(e) => return self.prompt_failed(e),
            },
            Some(id) => {
                let known = self.ctx.catalog.iter().find(|m| m.id == id).cloned();
                known.unwrap_or_else(|| {
                    let suggestions = catalog::suggest(&self.ctx.catalog, &id);
                    if !suggestions.is_empty() {
                        self.ctx.notices.warning(&format!(
                            "'{}' is not in the model list. Did you mean: {}?",
                            id,
                            suggestions.join(", ")
                        ));
                    }
                    catalog::resolve(&id)
                })
            }
        };

        if entry.backend == BackendKind::Hosted && !self.controller.backends().has_hosted() {
            self.ctx.notices.warning(&format!(
                "OPENAI_API_KEY is not set; requests to {} will fail.",
                entry.id
            ));
        }
        eprintln!("  Model switched to {}", entry);
        self.controller.model = entry;
    }

    fn instructions_command(&mut self, arg: Option<String>) {
        let text = match arg.as_deref() {
            Some("reset") => DEFAULT_INSTRUCTIONS.to_string(),
            Some(text) => text.to_string(),
            None => {
                let edited = inquire::Editor::new("Persona instructions:")
                    .with_predefined_text(&self.controller.settings.instructions)
                    .with_file_extension(".txt")
                    .prompt();
                match edited {
                    Ok(text) => text.trim().to_string(),
                    Err(e) => return self.prompt_failed(e),
                }
            }
        };

        if text.is_empty() {
            self.ctx.notices.warning("Instructions cannot be empty.");
            return;
        }
        self.controller.settings.instructions = text;
        self.ctx.notices.success("Instructions updated.");
    }

    fn topics_command(&mut self, arg: Option<String>) {
        let topics = match arg.as_deref() {
            Some("all") => prompt::all_topics(),
            Some(list) => {
                let (known, unknown) = prompt::parse_topics(list);
                if !unknown.is_empty() {
                    self.ctx
                        .notices
                        .warning(&format!("Unknown topic(s): {}", unknown.join(", ")));
                }
                known
            }
            None => {
                let all = prompt::all_topics();
                let selected: Vec<usize> = all
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| self.controller.settings.topics.contains(*t))
                    .map(|(i, _)| i)
                    .collect();
                let picked = inquire::MultiSelect::new("Geography topics:", all)
                    .with_default(&selected)
                    .with_page_size(13)
                    .prompt();
                match picked {
                    Ok(topics) => topics,
                    Err(e) => return self.prompt_failed(e),
                }
            }
        };

        if topics.is_empty() {
            self.ctx
                .notices
                .warning("Select at least one topic. Topics unchanged.");
            return;
        }
        eprintln!("  Focus: {}", topics.join(", "));
        self.controller.settings.topics = topics;
    }

    fn theme_command(&mut self, arg: Option<String>) {
        let theme = match arg {
            None => self.ctx.notices.theme().toggled(),
            Some(name) => match Theme::parse(&name) {
                Some(t) => t,
                None => {
                    self.ctx
                        .notices
                        .warning(&format!("Unknown theme '{}'. Use light or dark.", name));
                    return;
                }
            },
        };
        self.ctx.notices.set_theme(theme);
        eprintln!("  Theme: {}", theme);
    }

    fn save_command(&mut self, arg: Option<String>) {
        let name = arg.unwrap_or_else(|| self.ctx.default_save_name.clone());
        match self.ctx.store.save(self.state.messages(), &name) {
            Ok(path) => self
                .ctx
                .notices
                .success(&format!("Conversation saved to {}", path.display())),
            Err(e) => self
                .ctx
                .notices
                .error(&format!("Error saving conversation: {}", e)),
        }
    }

    fn load_command(&mut self, path: Option<String>, index: Option<usize>) {
        let Some(path) = self.upload_path(path) else {
            return;
        };

        let records = load_file(&path, self.ctx.notices.as_ref());
        if records.is_empty() {
            self.ctx
                .notices
                .error("No valid conversations found in the uploaded file.");
            return;
        }
        self.ctx.notices.success(&format!(
            "Loaded {} conversations from the uploaded file",
            records.len()
        ));

        let Some(record) = self.pick_record(&records, index) else {
            return;
        };
        self.state.replace_messages(record.messages.clone());
        self.ctx.notices.success("Conversation loaded successfully!");

        let palette = self.ctx.notices.palette();
        let mut out = std::io::stdout();
        if let Err(e) = display::write_history(&mut out, &palette, self.state.messages()) {
            tracing::debug!("history display failed: {}", e);
        }
    }

    fn upload_path(&self, arg: Option<String>) -> Option<PathBuf> {
        if let Some(arg) = arg {
            return match resolve_upload_path(&self.ctx.store, &arg) {
                Ok(p) => Some(p),
                Err(e) => {
                    self.ctx.notices.error(&format!("Error: {}", e));
                    None
                }
            };
        }

        let saved = self.ctx.store.list();
        if saved.is_empty() {
            self.ctx.notices.warning("No file was uploaded.");
            return None;
        }
        match inquire::Select::new("Conversation file:", saved).prompt() {
            Ok(name) => Some(self.ctx.store.base_dir().join(name)),
            Err(e) => {
                self.prompt_failed(e);
                None
            }
        }
    }

    fn pick_record<'a>(
        &self,
        records: &'a [ConversationRecord],
        index: Option<usize>,
    ) -> Option<&'a ConversationRecord> {
        if let Some(n) = index {
            let picked = n.checked_sub(1).and_then(|i| records.get(i));
            if picked.is_none() {
                self.ctx.notices.error(&format!(
                    "Conversation {} does not exist (1-{}).",
                    n,
                    records.len()
                ));
            }
            return picked;
        }
        if records.len() == 1 {
            return records.first();
        }

        let labels: Vec<String> = records
            .iter()
            .enumerate()
            .map(|(i, r)| record_label(i, r))
            .collect();
        match inquire::Select::new("Select a conversation to load:", labels.clone())
            .with_page_size(10)
            .prompt()
        {
            Ok(choice) => labels
                .iter()
                .position(|l| l == &choice)
                .and_then(|i| records.get(i)),
            Err(e) => {
                self.prompt_failed(e);
                None
            }
        }
    }

    fn print_status(&self) {
        let settings: &PromptSettings = &self.controller.settings;
        eprintln!("  Model: {}", self.controller.model);
        eprintln!(
            "  Name: {} | Theme: {}",
            self.state.user_name,
            self.ctx.notices.theme()
        );
        eprintln!(
            "  Topics: {} of {} | Instructions: {}",
            settings.topics.len(),
            prompt::GEOGRAPHY_CATEGORIES.len(),
            if settings.instructions == DEFAULT_INSTRUCTIONS {
                "default"
            } else {
                "custom"
            }
        );
        eprintln!(
            "  Usage counting: {:?} | Pacing: {} ms",
            self.controller.usage_policy,
            self.controller.pacing.interval().as_millis()
        );
        eprintln!(
            "  Messages: {} | {}",
            self.state.messages().len(),
            display::format_usage(&self.state.token_count())
        );
        eprintln!("  Conversations: {}", self.ctx.store.base_dir().display());
    }

    fn prompt_failed(&self, err: InquireError) {
        match err {
            InquireError::OperationCanceled | InquireError::OperationInterrupted => {
                self.ctx.notices.info("Cancelled.");
            }
            other => self.ctx.notices.error(&format!("Error: {}", other)),
        }
    }
}
