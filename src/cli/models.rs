// src/cli/models.rs - `geoexplorer models`

use std::sync::Arc;

use super::display::TerminalNotices;
use crate::infra::config::Config;
use crate::provider::catalog::{self, BackendKind, ModelEntry};
use crate::provider::Backends;

/// List the selectable models and whether each one can be used right now.
pub async fn list_models(config: &Config) -> anyhow::Result<()> {
    let notices = Arc::new(TerminalNotices::new(config.chat.theme));
    let (backends, local) = Backends::discover(&config.providers, notices).await;
    let entries = catalog::with_local_models(catalog::builtin_models(), &local);

    eprintln!("  {:<2}{:<28} {:<8} Status", "", "Model", "Backend");
    for entry in &entries {
        let marker = if entry.id == config.chat.model { "*" } else { "" };
        eprintln!(
            "  {:<2}{:<28} {:<8} {}",
            marker,
            entry.id,
            entry.backend,
            availability(entry, backends.has_hosted(), &local)
        );
    }

    if local.is_empty() {
        eprintln!(
            "\n  Ollama not reachable at {} (local models listed but not verified).",
            config.providers.ollama_base_url
        );
    }
    Ok(())
}

fn availability(entry: &ModelEntry, has_hosted: bool, local: &[String]) -> &'static str {
    match entry.backend {
        BackendKind::Hosted if has_hosted => "ready",
        BackendKind::Hosted => "needs OPENAI_API_KEY",
        BackendKind::Local if local.iter().any(|m| m == &entry.id) => "ready",
        BackendKind::Local if local.is_empty() => "unknown",
        BackendKind::Local => "not pulled",
    }
}
