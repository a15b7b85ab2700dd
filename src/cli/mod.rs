// src/cli/mod.rs - CLI definition (clap derive)

pub mod chat;
pub mod commands;
pub mod display;
pub mod history;
pub mod models;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "geoexplorer",
    about = "Chat with an AI geography guide, hosted or local",
    version
)]
pub struct Cli {
    /// Model to use (e.g. gpt-4o, llama3.1:8b), or "?" to pick interactively
    #[arg(short, long)]
    pub model: Option<String>,

    /// Interactively select a model before the session starts
    #[arg(long, visible_alias = "pick-model")]
    pub select_model: bool,

    /// Display name prefixed to your messages
    #[arg(long)]
    pub name: Option<String>,

    /// Color theme (light or dark)
    #[arg(long)]
    pub theme: Option<String>,

    /// Comma-separated geography topics to focus on
    #[arg(long, value_delimiter = ',')]
    pub topics: Vec<String>,

    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive chat session (default)
    Chat,
    /// List selectable models and whether their backend is reachable
    Models,
    /// Print the records of a saved conversation file
    History {
        /// File name in the conversations directory, or a path
        file: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_chat() {
        let cli = Cli::parse_from(["geoexplorer"]);
        assert!(cli.command.is_none());
        assert!(cli.topics.is_empty());
        assert!(!cli.select_model);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "geoexplorer",
            "-m",
            "llama3.1:8b",
            "--name",
            "Ana",
            "--theme",
            "dark",
            "--topics",
            "Rivers,Mountains",
        ]);
        assert_eq!(cli.model.as_deref(), Some("llama3.1:8b"));
        assert_eq!(cli.name.as_deref(), Some("Ana"));
        assert_eq!(cli.theme.as_deref(), Some("dark"));
        assert_eq!(cli.topics, vec!["Rivers".to_string(), "Mountains".to_string()]);
    }

    #[test]
    fn test_history_subcommand() {
        let cli = Cli::parse_from(["geoexplorer", "history", "trip.json"]);
        assert!(matches!(cli.command, Some(Commands::History { ref file }) if file == "trip.json"));
    }
}
