// src/infra/paths.rs - XDG-compliant path management
//
// All paths respect the GEOEXPLORER_HOME environment variable for isolation.
// When GEOEXPLORER_HOME is set, config and data live under that directory.
// When unset, config uses ~/.geoexplorer/ and data uses XDG_DATA_HOME/geoexplorer.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<Option<ProjectDirs>> = OnceLock::new();

fn project_dirs() -> Option<&'static ProjectDirs> {
    PROJECT_DIRS
        .get_or_init(|| ProjectDirs::from("", "", "geoexplorer"))
        .as_ref()
}

/// Returns the GEOEXPLORER_HOME override, if set.
fn geoexplorer_home() -> Option<PathBuf> {
    std::env::var_os("GEOEXPLORER_HOME").map(PathBuf::from)
}

/// Home directory, or the working directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $GEOEXPLORER_HOME/ or ~/.geoexplorer/
pub fn config_dir() -> PathBuf {
    if let Some(home) = geoexplorer_home() {
        return home;
    }
    dirs_home().join(".geoexplorer")
}

/// Data directory: $GEOEXPLORER_HOME/data/ or ~/.local/share/geoexplorer/
pub fn data_dir() -> PathBuf {
    if let Some(home) = geoexplorer_home() {
        return home.join("data");
    }
    match project_dirs() {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

/// Saved conversation files
pub fn conversations_dir() -> PathBuf {
    data_dir().join("conversations")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}
