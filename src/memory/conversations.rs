// src/memory/conversations.rs - Saved conversation files
//
// A conversation file is a JSON array of timestamped snapshots. Saving
// appends one snapshot and rewrites the file atomically (temp file + rename);
// records already in the file are carried over as raw JSON, untouched.
// Loading accepts any well-formed JSON, keeps what it can read and reports
// the rest as notices.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::core::notice::NoticeSink;
use crate::infra::errors::GeoError;
use crate::provider::Message;

/// One saved snapshot of a whole message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ConversationRecord {
    /// Snapshot `messages`, stamped with the local time.
    pub fn now(messages: &[Message]) -> Self {
        Self {
            timestamp: local_timestamp(),
            messages: messages.to_vec(),
        }
    }
}

/// Local time as ISO-8601 with microseconds and no offset, e.g. `2024-08-01T12:34:56.123456`.
pub fn local_timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Conversation files under one base directory.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    base_dir: PathBuf,
}

impl ConversationStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a user-supplied file name inside the base directory.
    ///
    /// Only a single plain component is accepted, so a name can never
    /// reach outside the base directory.
    pub fn path_for(&self, filename: &str) -> Result<PathBuf, GeoError> {
        let trimmed = filename.trim();
        let mut components = Path::new(trimmed).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if !trimmed.contains(['/', '\\']) => {
                Ok(self.base_dir.join(name))
            }
            _ => Err(GeoError::InvalidFilename(filename.to_string())),
        }
    }

    /// Append a snapshot of `messages` to `filename` and return the file path.
    ///
    /// An existing file that is not a JSON array is treated as empty and
    /// will be overwritten.
    pub fn save(&self, messages: &[Message], filename: &str) -> Result<PathBuf, GeoError> {
        let path = self.path_for(filename)?;
        std::fs::create_dir_all(&self.base_dir)?;

        let mut records = read_existing(&path);
        records.push(serde_json::to_value(ConversationRecord::now(messages))?);

        write_atomic(&path, &records)?;
        tracing::info!(
            "saved conversation ({} messages) to {} ({} record(s))",
            messages.len(),
            path.display(),
            records.len()
        );
        Ok(path)
    }

    /// Read the records of a saved file in the base directory. Records that
    /// cannot be read are left out.
    pub fn read(&self, filename: &str) -> Result<Vec<ConversationRecord>, GeoError> {
        let path = self.path_for(filename)?;
        let blob = std::fs::read(&path)?;
        let parsed = records_from_value(decode(&blob)?)?;
        if parsed.skipped_records > 0 || parsed.skipped_messages > 0 {
            tracing::debug!(
                "{}: skipped {} record(s) and {} message(s)",
                path.display(),
                parsed.skipped_records,
                parsed.skipped_messages
            );
        }
        Ok(parsed.records)
    }

    /// Names of the `*.json` files in the base directory, sorted.
    pub fn list(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.base_dir) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| n.ends_with(".json"))
            .collect();
        names.sort();
        names
    }
}

/// Parse an uploaded blob. Anything that is not well-formed JSON becomes an
/// error notice and an empty list; unreadable parts of well-formed JSON are
/// skipped with a warning.
pub fn load(blob: &[u8], notices: &dyn NoticeSink) -> Vec<ConversationRecord> {
    let value = match decode(blob) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("rejected conversation upload: {}", e);
            notices.error(
                "Error decoding the uploaded file. The file may be corrupted or not in JSON format.",
            );
            return Vec::new();
        }
    };

    let parsed = match records_from_value(value) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("rejected conversation upload: {}", e);
            notices.error("The uploaded file is JSON but does not contain a list of conversations.");
            return Vec::new();
        }
    };

    if parsed.skipped_records > 0 {
        notices.warning(&format!(
            "Skipped {} conversation(s) that could not be read.",
            parsed.skipped_records
        ));
    }
    if parsed.skipped_messages > 0 {
        notices.warning(&format!(
            "Skipped {} message(s) with an unknown role or no text.",
            parsed.skipped_messages
        ));
    }
    parsed.records
}

/// Load a conversation file from anywhere on disk. A missing file is only a warning.
pub fn load_file(path: &Path, notices: &dyn NoticeSink) -> Vec<ConversationRecord> {
    match std::fs::read(path) {
        Ok(blob) => load(&blob, notices),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            notices.warning("No file was uploaded.");
            Vec::new()
        }
        Err(e) => {
            notices.error(&format!("Error reading {}: {}", path.display(), e));
            Vec::new()
        }
    }
}

/// Records read from well-formed JSON, and what had to be left out.
#[derive(Debug, Default)]
struct ParsedRecords {
    records: Vec<ConversationRecord>,
    skipped_records: usize,
    skipped_messages: usize,
}

fn decode(blob: &[u8]) -> Result<Value, GeoError> {
    let text = std::str::from_utf8(blob)
        .map_err(|e| GeoError::Conversation(format!("not UTF-8: {}", e)))?;
    Ok(serde_json::from_str(text)?)
}

/// A list of records, or a single record object.
fn records_from_value(value: Value) -> Result<ParsedRecords, GeoError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        other => {
            return Err(GeoError::Conversation(format!(
                "expected a list of conversations, found {}",
                json_kind(&other)
            )))
        }
    };

    let mut parsed = ParsedRecords::default();
    for item in &items {
        match record_from_value(item) {
            Some((record, dropped)) => {
                parsed.skipped_messages += dropped;
                parsed.records.push(record);
            }
            None => parsed.skipped_records += 1,
        }
    }
    Ok(parsed)
}

/// Lenient view of one record. Returns the record and the number of messages
/// dropped from it, or `None` when the item is not a record at all.
fn record_from_value(value: &Value) -> Option<(ConversationRecord, usize)> {
    let obj = value.as_object()?;

    let timestamp = match obj.get("timestamp") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let mut dropped = 0;
    let messages = match obj.get("messages") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|m| {
                let msg = Message::deserialize(m).ok();
                if msg.is_none() {
                    dropped += 1;
                }
                msg
            })
            .collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(_) => return None,
    };

    Some((ConversationRecord { timestamp, messages }, dropped))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Existing records as raw JSON. Anything but a readable JSON array yields none.
fn read_existing(path: &Path) -> Vec<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!("cannot read {}, starting fresh: {}", path.display(), e);
            return Vec::new();
        }
    };
    match serde_json::from_str(&content) {
        Ok(Value::Array(records)) => records,
        Ok(other) => {
            tracing::warn!(
                "{} holds {} instead of a list, starting fresh",
                path.display(),
                json_kind(&other)
            );
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("{} is not a conversation file, starting fresh: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn write_atomic(path: &Path, records: &[Value]) -> Result<(), GeoError> {
    let json = serde_json::to_string_pretty(records)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    let mut f = std::fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    f.flush()?;
    f.sync_all()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
