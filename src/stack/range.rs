//! Selecting which part of the catalog a run applies.

use crate::errors::{PatchStackError, Result};
use crate::stack::catalog::{OrderKey, PatchCatalog, PatchEntry, PatchName};
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Inclusive run of catalog entries selected for one invocation
#[derive(Debug, Clone, Copy)]
pub struct PatchRange<'c> {
    entries: &'c [PatchEntry],
}

impl<'c> PatchRange<'c> {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'c, PatchEntry> {
        self.entries.iter()
    }
}

/// Clamp `catalog` to the patches this run should apply.
///
/// The resume point lies strictly after the last applied descriptor, compared
/// by order key so that a renamed descriptor still positions correctly.
/// `first` and `last` are catalog file names. Without `first`, a `last` that
/// is already applied selects nothing, so re-running a split run is a no-op.
pub fn clamp<'c>(
    catalog: &'c PatchCatalog,
    applied: &[String],
    first: Option<&str>,
    last: Option<&str>,
) -> Result<PatchRange<'c>> {
    let entries = catalog.entries();
    let last_applied = applied.last();
    let resume_key: Option<OrderKey> = match last_applied {
        Some(name) => Some(PatchName::parse(name, catalog.order())?.order_key()),
        None => None,
    };

    let resume_index = match resume_key {
        Some(key) => entries
            .iter()
            .position(|e| e.order_key() > key)
            .unwrap_or(entries.len()),
        None => 0,
    };

    let start = match first {
        Some(first) => {
            let index = locate(catalog, "first", first)?;
            if let (Some(key), Some(applied_name)) = (resume_key, last_applied) {
                if entries[index].order_key() <= key {
                    return Err(PatchStackError::FirstPrecedesApplied {
                        first: first.to_string(),
                        last_applied: applied_name.clone(),
                    });
                }
            }
            index
        }
        None => resume_index,
    };

    let end = match last {
        Some(last) => {
            let index = locate(catalog, "last", last)?;
            if index < start && first.is_none() {
                info!("{} is already applied.", last);
                start
            } else if index < start {
                return Err(PatchStackError::RangeInverted {
                    first: entries[start].file_name().to_string(),
                    last: last.to_string(),
                });
            } else {
                index + 1
            }
        }
        None => entries.len(),
    };

    Ok(PatchRange {
        entries: &entries[start..end],
    })
}

fn locate(catalog: &PatchCatalog, flag: &str, name: &str) -> Result<usize> {
    catalog
        .position(name)
        .ok_or_else(|| PatchStackError::UnknownPatch {
            flag: flag.to_string(),
            name: name.to_string(),
            directory: catalog.directory().to_path_buf(),
        })
}

/// Turn a `--first`/`--last` argument into a catalog file name.
///
/// The argument is either a bare file name or a path whose parent directory
/// is the patch directory.
pub fn resolve_bound(
    flag: &str,
    value: &str,
    patch_dir: &Path,
    catalog: &PatchCatalog,
) -> Result<String> {
    let as_path = Path::new(value);
    let basename = as_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            PatchStackError::validation(format!("--{flag} ({value}) is not a patch file name"))
        })?;

    let has_parent = as_path
        .parent()
        .is_some_and(|p| !p.as_os_str().is_empty());
    if has_parent {
        let parent = resolve_dir(&expand_home(as_path.parent().unwrap_or(as_path)));
        if parent != resolve_dir(patch_dir) {
            return Err(PatchStackError::validation(format!(
                "--{flag} ({value}) is given as a path but its parent directory is not {}. \
                 Use --path to select the target tree.",
                patch_dir.display()
            )));
        }
    }

    PatchName::parse(basename, catalog.order())?;
    if catalog.find(basename).is_none() {
        return Err(PatchStackError::UnknownPatch {
            flag: flag.to_string(),
            name: value.to_string(),
            directory: patch_dir.to_path_buf(),
        });
    }
    Ok(basename.to_string())
}

fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

fn resolve_dir(dir: &Path) -> PathBuf {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(dir),
            Err(_) => dir.to_path_buf(),
        }
    };
    absolute.canonicalize().unwrap_or(absolute)
}
