// src/cli/commands.rs - Slash command parsing for the chat REPL

/// A parsed `/command`. Arguments are trimmed; empty means "ask interactively".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Model(Option<String>),
    Instructions(Option<String>),
    Topics(Option<String>),
    Theme(Option<String>),
    Name(Option<String>),
    Clear,
    Save(Option<String>),
    Load {
        path: Option<String>,
        index: Option<usize>,
    },
    Tokens,
    Status,
    Help,
    Quit,
    Unknown(String),
}

impl SlashCommand {
    /// `None` when `input` is not a slash command.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if !input.starts_with('/') {
            return None;
        }

        let (cmd, arg) = match input.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (input, ""),
        };
        let arg = (!arg.is_empty()).then(|| arg.to_string());

        let parsed = match cmd {
            "/model" => SlashCommand::Model(arg),
            "/instructions" => SlashCommand::Instructions(arg),
            "/topics" => SlashCommand::Topics(arg),
            "/theme" => SlashCommand::Theme(arg),
            "/name" => SlashCommand::Name(arg),
            "/clear" => SlashCommand::Clear,
            "/save" => SlashCommand::Save(arg),
            "/load" => parse_load(arg.as_deref()),
            "/tokens" => SlashCommand::Tokens,
            "/status" => SlashCommand::Status,
            "/help" => SlashCommand::Help,
            "/quit" | "/exit" => SlashCommand::Quit,
            other => SlashCommand::Unknown(other.to_string()),
        };
        Some(parsed)
    }
}

// "/load trip.json 2": a trailing number picks the record (1-based).
fn parse_load(arg: Option<&str>) -> SlashCommand {
    let Some(arg) = arg else {
        return SlashCommand::Load {
            path: None,
            index: None,
        };
    };

    if let Some((path, last)) = arg.rsplit_once(char::is_whitespace) {
        if let Ok(n) = last.parse::<usize>() {
            return SlashCommand::Load {
                path: Some(path.trim().to_string()),
                index: Some(n),
            };
        }
    }
    SlashCommand::Load {
        path: Some(arg.to_string()),
        index: None,
    }
}

pub const HELP: &[(&str, &str)] = &[
    ("/model [id]", "Show the model picker or switch to a model"),
    ("/instructions [text|reset]", "Edit, replace or reset the persona instructions"),
    ("/topics [a, b|all]", "Pick the geography topics to focus on"),
    ("/theme [light|dark]", "Toggle or set the color theme"),
    ("/name [name]", "Show or set your display name"),
    ("/clear", "Clear the chat history"),
    ("/save [file]", "Append this conversation to a file"),
    ("/load [path] [n]", "Load a saved conversation"),
    ("/tokens", "Show token usage for this session"),
    ("/status", "Show session settings"),
    ("/help", "Show this help"),
    ("/quit, quit, exit", "End session"),
];
