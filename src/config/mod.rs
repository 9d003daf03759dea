pub mod settings;

pub use settings::{GitSettings, PatchSettings, Settings};

use crate::errors::{PatchStackError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

/// Get the user-wide configuration directory (~/.patchstack/)
pub fn get_config_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| PatchStackError::config("Could not find home directory"))?;
    Ok(home_dir.join(".patchstack"))
}

/// Get the configuration directory for a specific tree
pub fn get_repo_config_dir(tree: &Path) -> PathBuf {
    tree.join(".patchstack")
}

/// Path of the tree-level config file
pub fn repo_config_file(tree: &Path) -> PathBuf {
    get_repo_config_dir(tree).join(CONFIG_FILE)
}

/// Ensure the configuration directory exists
pub fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        fs::create_dir_all(config_dir).map_err(|e| {
            PatchStackError::config(format!("Failed to create config directory: {e}"))
        })?;
    }
    Ok(())
}

/// Load settings for a tree: the tree's own file wins, then the user-wide
/// file, then built-in defaults.
pub fn load_settings(tree: &Path) -> Result<Settings> {
    let repo_file = repo_config_file(tree);
    if repo_file.exists() {
        tracing::debug!("Loading settings from {}", repo_file.display());
        return Settings::load_from_file(&repo_file);
    }

    if let Ok(dir) = get_config_dir() {
        let user_file = dir.join(CONFIG_FILE);
        if user_file.exists() {
            tracing::debug!("Loading settings from {}", user_file.display());
            return Settings::load_from_file(&user_file);
        }
    }

    Ok(Settings::default())
}
