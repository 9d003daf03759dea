pub mod apply;
pub mod completions;
pub mod config;
pub mod format;
pub mod status;

use crate::errors::{PatchStackError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// The directory given with --path, or the current directory
pub(crate) fn target_dir(path: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match path {
        Some(path) => path,
        None => env::current_dir()
            .map_err(|e| PatchStackError::config(format!("Could not get current directory: {e}")))?,
    };
    dir.canonicalize().map_err(|e| {
        PatchStackError::config(format!("Target directory {} is not accessible: {e}", dir.display()))
    })
}

/// Resolve a user-supplied directory against the current directory
pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir()
        .map_err(|e| PatchStackError::config(format!("Could not get current directory: {e}")))?;
    Ok(cwd.join(path))
}
