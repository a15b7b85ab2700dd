// src/provider/catalog.rs - Built-in model list, backend classification, validation

use serde::{Deserialize, Serialize};

/// Which backend family serves a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted chat-completions API (OpenAI).
    Hosted,
    /// Locally served models (Ollama).
    Local,
}

/// Identifiers starting with this literal are served by the hosted API.
const HOSTED_PREFIX: &str = "gpt-";

impl BackendKind {
    /// The one naming rule that maps a free-form identifier to a backend.
    pub fn classify(model_id: &str) -> Self {
        if model_id.starts_with(HOSTED_PREFIX) {
            BackendKind::Hosted
        } else {
            BackendKind::Local
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::Hosted => "openai",
            BackendKind::Local => "ollama",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

/// A selectable model with its backend resolved once, at selection time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub backend: BackendKind,
}

impl ModelEntry {
    pub fn new(id: impl Into<String>, backend: BackendKind) -> Self {
        Self {
            id: id.into(),
            backend,
        }
    }

    /// Build an entry for an arbitrary identifier, classifying it by name.
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let backend = BackendKind::classify(&id);
        Self { id, backend }
    }
}

impl std::fmt::Display for ModelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.backend, self.id)
    }
}

const BUILTIN: &[(&str, BackendKind)] = &[
    ("gpt-4o", BackendKind::Hosted),
    ("gpt-4o-mini", BackendKind::Hosted),
    ("gpt-4-turbo", BackendKind::Hosted),
    ("gpt-3.5-turbo", BackendKind::Hosted),
    ("llama3.1:8b", BackendKind::Local),
    ("gemma2:2b", BackendKind::Local),
    ("mistral-nemo:latest", BackendKind::Local),
    ("phi3:latest", BackendKind::Local),
];

/// The models offered by the selector, hosted first.
pub fn builtin_models() -> Vec<ModelEntry> {
    BUILTIN
        .iter()
        .map(|(id, kind)| ModelEntry::new(*id, *kind))
        .collect()
}

/// Resolve an identifier to an entry: the catalog's own entry when listed,
/// otherwise a name-classified one.
pub fn resolve(model_id: &str) -> ModelEntry {
    let model_id = model_id.trim();
    builtin_models()
        .into_iter()
        .find(|m| m.id == model_id)
        .unwrap_or_else(|| ModelEntry::from_id(model_id))
}

/// Merge locally discovered model names into a catalog, skipping duplicates.
pub fn with_local_models(mut catalog: Vec<ModelEntry>, local: &[String]) -> Vec<ModelEntry> {
    for name in local {
        if !catalog.iter().any(|m| &m.id == name) {
            catalog.push(ModelEntry::new(name.clone(), BackendKind::Local));
        }
    }
    catalog
}

/// Close catalog identifiers for an unknown one (Jaro-Winkler > 0.7, best first, at most 5).
pub fn suggest(catalog: &[ModelEntry], model_id: &str) -> Vec<String> {
    if catalog.iter().any(|m| m.id == model_id) {
        return Vec::new();
    }

    let mut scored: Vec<(&str, f64)> = catalog
        .iter()
        .map(|m| (m.id.as_str(), strsim::jaro_winkler(&m.id, model_id)))
        .filter(|(_, score)| *score > 0.7)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(5);

    scored.into_iter().map(|(id, _)| id.to_string()).collect()
}
