// src/cli/history.rs - `geoexplorer history <file>`

use std::path::PathBuf;

use super::display::{self, TerminalNotices};
use crate::infra::config::Config;
use crate::infra::errors::GeoError;
use crate::memory::{load_file, ConversationRecord, ConversationStore};
use crate::util::preview;

/// A path that exists is used as is; anything else must be a plain file
/// name inside the conversations directory.
pub fn resolve_upload_path(store: &ConversationStore, arg: &str) -> Result<PathBuf, GeoError> {
    let given = PathBuf::from(arg.trim());
    if given.is_file() {
        return Ok(given);
    }
    store.path_for(arg)
}

/// One line per record for pickers and listings.
pub fn record_label(index: usize, record: &ConversationRecord) -> String {
    let first_user = record
        .messages
        .iter()
        .find(|m| m.role == crate::provider::Role::User)
        .map(|m| preview(&m.content, 48))
        .unwrap_or_default();
    let stamp = if record.timestamp.is_empty() {
        "(no timestamp)"
    } else {
        record.timestamp.as_str()
    };
    format!(
        "{}. {} ({} messages) {}",
        index + 1,
        stamp,
        record.messages.len(),
        first_user
    )
    .trim_end()
    .to_string()
}

pub async fn show_history(config: &Config, file: &str) -> anyhow::Result<()> {
    let notices = TerminalNotices::new(config.chat.theme);
    let store = ConversationStore::new(config.storage.conversations_dir());
    let path = resolve_upload_path(&store, file)?;

    let records = load_file(&path, &notices);
    if records.is_empty() {
        anyhow::bail!("No valid conversations found in {}", path.display());
    }

    let palette = notices.palette();
    let mut out = std::io::stdout();
    for (i, record) in records.iter().enumerate() {
        println!("\n{}", record_label(i, record));
        display::write_history(&mut out, &palette, &record.messages)?;
    }
    Ok(())
}
