// src/main.rs - geoexplorer entry point

use clap::Parser;
use std::sync::Arc;

use geoexplorer::cli::chat::{self, ChatContext};
use geoexplorer::cli::display::TerminalNotices;
use geoexplorer::cli::{Cli, Commands};
use geoexplorer::core::notice::NoticeSink;
use geoexplorer::core::pacing::Pacing;
use geoexplorer::core::prompt::{self, PromptSettings};
use geoexplorer::core::{SessionController, SessionState};
use geoexplorer::infra::config::{Config, Theme};
use geoexplorer::infra::logger;
use geoexplorer::memory::ConversationStore;
use geoexplorer::provider::catalog;
use geoexplorer::provider::Backends;

#[tokio::main]
async fn main() {
    // Initialize logging (respects RUST_LOG)
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let mut config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    // Dispatch subcommands that don't start a session
    match &cli.command {
        Some(Commands::Models) => {
            return geoexplorer::cli::models::list_models(&config).await;
        }
        Some(Commands::History { file }) => {
            return geoexplorer::cli::history::show_history(&config, file).await;
        }
        Some(Commands::Chat) | None => {}
    }

    // CLI flags override config
    if let Some(ref theme) = cli.theme {
        config.chat.theme = Theme::parse(theme)
            .ok_or_else(|| anyhow::anyhow!("Unknown theme '{}'. Use light or dark.", theme))?;
    }
    if let Some(ref name) = cli.name {
        config.chat.user_name = name.clone();
    }

    let notices = Arc::new(TerminalNotices::new(config.chat.theme));

    if !cli.topics.is_empty() {
        let (known, unknown) = prompt::parse_topics(&cli.topics.join(","));
        if !unknown.is_empty() {
            notices.warning(&format!("Unknown topic(s): {}", unknown.join(", ")));
        }
        if !known.is_empty() {
            config.chat.topics = Some(known);
        }
    }

    let (backends, local_models) = Backends::discover(&config.providers, notices.clone()).await;
    let models = catalog::with_local_models(catalog::builtin_models(), &local_models);

    // Determine the model: --select-model or -m ? > CLI flag > config
    let model = if cli.select_model || cli.model.as_deref() == Some("?") {
        let current = catalog::resolve(&config.chat.model);
        chat::pick_model(&models, &current)
            .map_err(|_| anyhow::anyhow!("Model selection cancelled"))?
    } else {
        let id = cli.model.as_deref().unwrap_or(&config.chat.model);
        models
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .unwrap_or_else(|| catalog::resolve(id))
    };
    tracing::info!("starting session with {}", model);

    let settings = PromptSettings::new(config.chat.instructions.clone(), config.chat.topics.clone());
    let controller = SessionController::new(Arc::new(backends), model, settings)
        .with_pacing(Pacing::new(config.chat.pacing_interval()))
        .with_usage_policy(config.chat.usage);

    let ctx = ChatContext {
        notices,
        catalog: models,
        store: ConversationStore::new(config.storage.conversations_dir()),
        default_save_name: config.storage.default_save_name.clone(),
    };

    chat::run_chat(controller, SessionState::new(config.chat.user_name.clone()), ctx).await
}
