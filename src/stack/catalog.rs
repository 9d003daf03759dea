use crate::errors::{PatchStackError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Category names in their built-in priority order
pub const DEFAULT_CATEGORIES: [&str; 4] = [
    "long-term",
    "cherry-pick",
    "backward-compatibility",
    "forward-compatibility",
];

/// Extension that marks a diff-based patch
pub const DIFF_EXTENSION: &str = "patch";

/// Position of a patch in canonical application order: category rank first,
/// then the sequence number within the category.
pub type OrderKey = (usize, u16);

/// Ordered list of patch categories. Earlier categories apply first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOrder {
    names: Vec<String>,
}

impl CategoryOrder {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rank(&self, category: &str) -> Option<usize> {
        self.names.iter().position(|c| c == category)
    }
}

impl Default for CategoryOrder {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect())
    }
}

/// How a patch is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchKind {
    /// Unified diff, applied with `git am` / `git apply`
    Diff,
    /// Executable run inside the working tree
    Script,
}

/// A parsed `<category>-<NNNN>-<name>.<ext>` file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchName {
    pub file_name: String,
    pub category: String,
    pub rank: usize,
    pub sequence: u16,
    pub name: String,
    pub extension: String,
}

impl PatchName {
    /// Parse a file name or commit descriptor against a category order.
    pub fn parse(file_name: &str, order: &CategoryOrder) -> Result<Self> {
        let mut reason = None;

        for (rank, category) in order.names().iter().enumerate() {
            let Some(rest) = file_name
                .strip_prefix(category.as_str())
                .and_then(|r| r.strip_prefix('-'))
            else {
                continue;
            };

            match Self::parse_after_category(rest) {
                Ok((sequence, name, extension)) => {
                    return Ok(Self {
                        file_name: file_name.to_string(),
                        category: category.clone(),
                        rank,
                        sequence,
                        name: name.to_string(),
                        extension: extension.to_string(),
                    });
                }
                // Another category may share this prefix; keep looking.
                Err(r) => reason = Some(r),
            }
        }

        Err(PatchStackError::malformed(
            file_name,
            reason.unwrap_or_else(|| {
                format!(
                    "patch name must start with one of the prefixes {}",
                    order.names().join(", ")
                )
            }),
        ))
    }

    fn parse_after_category(rest: &str) -> std::result::Result<(u16, &str, &str), String> {
        let digits = rest
            .get(..4)
            .filter(|d| d.bytes().all(|b| b.is_ascii_digit()));
        let Some(digits) = digits else {
            return Err("sequence number must be exactly 4 digits".to_string());
        };
        let Some(tail) = rest[4..].strip_prefix('-') else {
            return Err("sequence number must be exactly 4 digits".to_string());
        };
        let sequence = digits
            .parse::<u16>()
            .map_err(|e| format!("invalid sequence number: {e}"))?;

        match tail.rsplit_once('.') {
            Some((name, extension)) if !name.is_empty() && !extension.is_empty() => {
                Ok((sequence, name, extension))
            }
            _ => Err("expected <name>.<ext> after the sequence number".to_string()),
        }
    }

    pub fn order_key(&self) -> OrderKey {
        (self.rank, self.sequence)
    }

    /// Whether the name denotes a diff patch. Scripts are recognised by their
    /// permission bits, which a bare descriptor does not carry.
    pub fn is_diff(&self) -> bool {
        self.extension == DIFF_EXTENSION
    }
}

/// One patch file in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchEntry {
    pub name: PatchName,
    pub kind: PatchKind,
    pub path: PathBuf,
}

impl PatchEntry {
    pub fn file_name(&self) -> &str {
        &self.name.file_name
    }

    pub fn order_key(&self) -> OrderKey {
        self.name.order_key()
    }
}

/// Every patch in a directory, sorted in canonical application order.
#[derive(Debug, Clone)]
pub struct PatchCatalog {
    directory: PathBuf,
    order: CategoryOrder,
    entries: Vec<PatchEntry>,
}

impl PatchCatalog {
    /// Read and validate a patch directory.
    pub fn enumerate(directory: &Path, order: &CategoryOrder) -> Result<Self> {
        let read_dir = fs::read_dir(directory).map_err(|e| {
            PatchStackError::config(format!(
                "Could not read patch directory {}: {e}",
                directory.display()
            ))
        })?;

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            if path.is_dir() {
                continue;
            }

            let file_name = dir_entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                return Err(PatchStackError::malformed(
                    file_name.to_string_lossy(),
                    "file name is not valid UTF-8",
                ));
            };
            if file_name.starts_with('.') {
                continue;
            }

            let name = PatchName::parse(file_name, order)?;
            let kind = if name.is_diff() {
                PatchKind::Diff
            } else if is_executable(&path)? {
                PatchKind::Script
            } else {
                return Err(PatchStackError::malformed(
                    file_name,
                    "neither a .patch file nor an executable script",
                ));
            };

            entries.push(PatchEntry { name, kind, path });
        }

        Self::from_entries(directory, order, entries)
    }

    /// Build a catalog from already-parsed entries, enforcing uniqueness and order.
    pub fn from_entries(
        directory: &Path,
        order: &CategoryOrder,
        mut entries: Vec<PatchEntry>,
    ) -> Result<Self> {
        entries.sort_by_key(|e| e.order_key());

        for pair in entries.windows(2) {
            if pair[0].order_key() == pair[1].order_key() {
                return Err(PatchStackError::malformed(
                    pair[1].file_name(),
                    format!(
                        "sequence number {:04} is already used in category {} by {}",
                        pair[1].name.sequence,
                        pair[1].name.category,
                        pair[0].file_name()
                    ),
                ));
            }
        }

        tracing::debug!(
            "Found {} patches in {}",
            entries.len(),
            directory.display()
        );

        Ok(Self {
            directory: directory.to_path_buf(),
            order: order.clone(),
            entries,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn order(&self) -> &CategoryOrder {
        &self.order
    }

    pub fn entries(&self) -> &[PatchEntry] {
        &self.entries
    }

    pub fn find(&self, file_name: &str) -> Option<&PatchEntry> {
        self.entries.iter().find(|e| e.file_name() == file_name)
    }

    pub fn position(&self, file_name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.file_name() == file_name)
    }

    pub fn file_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.file_name().to_string()).collect()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)?.permissions().mode();
    Ok(mode & 0o100 != 0)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> Result<bool> {
    Ok(false)
}
