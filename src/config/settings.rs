use crate::errors::{PatchStackError, Result};
use crate::stack::{trailer, CategoryOrder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub patches: PatchSettings,
    pub git: GitSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatchSettings {
    /// Patch directory, relative to the target tree
    pub directory: String,
    /// Category names in application priority order
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitSettings {
    /// Lightweight tag marking the commit before the first patch
    pub marker_tag: String,
    /// Commit trailer recording which patch produced a commit
    pub trailer_key: String,
    /// Prefix of branches created by `format --backup-branch`
    pub backup_branch_prefix: String,
    /// Lines of context that must match when applying (`-C<n>`)
    pub context_lines: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            patches: PatchSettings::default(),
            git: GitSettings::default(),
        }
    }
}

impl Default for PatchSettings {
    fn default() -> Self {
        Self {
            directory: "libchrome_tools/patches".to_string(),
            categories: CategoryOrder::default().names().to_vec(),
        }
    }
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            marker_tag: "HEAD-before-patching".to_string(),
            trailer_key: "patch-name".to_string(),
            backup_branch_prefix: "apply-patch-backup".to_string(),
            context_lines: 1,
        }
    }
}

impl Settings {
    /// Load settings from a file, falling back to defaults when it is absent
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| PatchStackError::config(format!("Failed to read config file: {e}")))?;

        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| PatchStackError::config(format!("Failed to parse config file: {e}")))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| PatchStackError::config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)
            .map_err(|e| PatchStackError::config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// The configured category priority
    pub fn category_order(&self) -> CategoryOrder {
        CategoryOrder::new(self.patches.categories.clone())
    }

    /// Absolute patch directory for a target tree
    pub fn patch_dir(&self, tree: &Path) -> std::path::PathBuf {
        let dir = Path::new(&self.patches.directory);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            tree.join(dir)
        }
    }

    /// All keys accepted by `get_value` / `set_value`
    pub fn keys() -> &'static [&'static str] {
        &[
            "patches.directory",
            "patches.categories",
            "git.marker_tag",
            "git.trailer_key",
            "git.backup_branch_prefix",
            "git.context_lines",
        ]
    }

    /// Update a configuration value by key
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() != 2 {
            return Err(PatchStackError::config(format!(
                "Invalid config key format: {key}"
            )));
        }

        match (parts[0], parts[1]) {
            ("patches", "directory") => self.patches.directory = value.to_string(),
            ("patches", "categories") => {
                self.patches.categories = value
                    .split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
            }
            ("git", "marker_tag") => self.git.marker_tag = value.to_string(),
            ("git", "trailer_key") => self.git.trailer_key = value.to_string(),
            ("git", "backup_branch_prefix") => self.git.backup_branch_prefix = value.to_string(),
            ("git", "context_lines") => {
                self.git.context_lines = value
                    .parse()
                    .map_err(|_| PatchStackError::config(format!("Invalid number: {value}")))?;
            }
            _ => return Err(PatchStackError::config(format!("Unknown config key: {key}"))),
        }

        Ok(())
    }

    /// Get a configuration value by key
    pub fn get_value(&self, key: &str) -> Result<String> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() != 2 {
            return Err(PatchStackError::config(format!(
                "Invalid config key format: {key}"
            )));
        }

        let value = match (parts[0], parts[1]) {
            ("patches", "directory") => self.patches.directory.clone(),
            ("patches", "categories") => self.patches.categories.join(","),
            ("git", "marker_tag") => self.git.marker_tag.clone(),
            ("git", "trailer_key") => self.git.trailer_key.clone(),
            ("git", "backup_branch_prefix") => self.git.backup_branch_prefix.clone(),
            ("git", "context_lines") => self.git.context_lines.to_string(),
            _ => return Err(PatchStackError::config(format!("Unknown config key: {key}"))),
        };

        Ok(value)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.patches.directory.trim().is_empty() {
            return Err(PatchStackError::config("patches.directory must not be empty"));
        }

        if self.patches.categories.is_empty() {
            return Err(PatchStackError::config(
                "patches.categories must name at least one category",
            ));
        }
        for (i, category) in self.patches.categories.iter().enumerate() {
            if category.is_empty() || category.contains(char::is_whitespace) {
                return Err(PatchStackError::config(format!(
                    "Invalid category name: '{category}'"
                )));
            }
            if self.patches.categories[..i].contains(category) {
                return Err(PatchStackError::config(format!(
                    "Duplicate category: {category}"
                )));
            }
        }

        if self.git.marker_tag.trim().is_empty() {
            return Err(PatchStackError::config("git.marker_tag must not be empty"));
        }
        if !git2::Reference::is_valid_name(&format!("refs/tags/{}", self.git.marker_tag)) {
            return Err(PatchStackError::config(format!(
                "Invalid tag name: {}",
                self.git.marker_tag
            )));
        }

        let key = &self.git.trailer_key;
        if !trailer::is_valid_key(key) {
            return Err(PatchStackError::config(format!(
                "Invalid trailer key: '{key}' (use ASCII letters, digits and '-')"
            )));
        }

        if self.git.backup_branch_prefix.trim().is_empty() {
            return Err(PatchStackError::config(
                "git.backup_branch_prefix must not be empty",
            ));
        }

        Ok(())
    }
}
