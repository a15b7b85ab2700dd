// src/infra/config.rs - Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::infra::errors::GeoError;
use crate::infra::paths;
use crate::provider::{ollama, openai};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Model identifier selected at startup.
    pub model: String,
    pub user_name: String,
    pub theme: Theme,
    /// Replaces the built-in persona instructions when set.
    pub instructions: Option<String>,
    /// Topic subset to focus on. `None` selects every topic.
    pub topics: Option<Vec<String>>,
    /// Minimum gap between two display updates while streaming.
    pub pacing_ms: u64,
    pub usage: UsagePolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            user_name: "Explorer".into(),
            theme: Theme::Light,
            instructions: None,
            topics: None,
            pacing_ms: 50,
            usage: UsagePolicy::Stream,
        }
    }
}

impl ChatConfig {
    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

/// Where a turn's token counts come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsagePolicy {
    /// Use the usage summary the stream reports, recounting only when it reports none.
    #[default]
    Stream,
    /// Always issue a second, non-streaming call with the same prompt to count tokens.
    Recount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai_base_url: String,
    pub ollama_base_url: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai_base_url: openai::DEFAULT_BASE_URL.into(),
            ollama_base_url: ollama::DEFAULT_BASE_URL.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory conversation files are saved into. Defaults to the data dir.
    pub conversations_dir: Option<PathBuf>,
    pub default_save_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            conversations_dir: None,
            default_save_name: "geography_exploration_conversation.json".into(),
        }
    }
}

impl StorageConfig {
    pub fn conversations_dir(&self) -> PathBuf {
        self.conversations_dir
            .clone()
            .unwrap_or_else(paths::conversations_dir)
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| GeoError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }
}
