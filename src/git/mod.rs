//! Version-control capability used by the patch stack.
//!
//! Every stack operation receives an explicit `&dyn VersionControl` handle
//! instead of reaching for ambient repository state. Three implementations
//! exist:
//! - [`GitRepository`]: git2 for reads and ref/commit mutations, the `git`
//!   binary for `am`, `apply` and `format-patch`
//! - [`UnversionedTree`]: a plain directory (ebuild builds), supporting only
//!   tree-level operations
//! - [`DryRun`]: wraps another handle, delegates reads and logs mutations

pub mod command;
pub mod dry_run;
pub mod repository;
pub mod unversioned;

pub use command::{run_git, GitOutput};
pub use dry_run::DryRun;
pub use repository::GitRepository;
pub use unversioned::UnversionedTree;

use crate::errors::{PatchStackError, Result};
use std::path::{Path, PathBuf};

/// Which git tool applies a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyTool {
    /// `git am`: the patch carries its own commit message and creates a commit
    Mailbox,
    /// `git apply`: only the working tree (and index with --3way) changes
    Worktree,
    /// `git apply --index`: the working tree and index change together, so
    /// only the files the patch touches end up staged
    Index,
}

impl ApplyTool {
    pub fn command_name(&self) -> &'static str {
        match self {
            ApplyTool::Mailbox => "am",
            ApplyTool::Worktree | ApplyTool::Index => "apply",
        }
    }

    /// Flags that select this tool's mode beyond the command name
    pub fn mode_flags(&self) -> &'static [&'static str] {
        match self {
            ApplyTool::Index => &["--index"],
            ApplyTool::Mailbox | ApplyTool::Worktree => &[],
        }
    }
}

/// Result of a single apply attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Rejected { stderr: String },
}

/// Result of running a script-based patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub success: bool,
    /// Human readable exit status, e.g. "exit status: 3"
    pub status: String,
}

/// A commit on the stack, as seen from the history walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    pub summary: String,
    pub message: String,
}

impl CommitInfo {
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(12)]
    }
}

/// Capabilities the patch stack consumes from its substrate.
pub trait VersionControl {
    /// Root of the working tree
    fn workdir(&self) -> &Path;

    /// Whether tracked files have uncommitted changes (untracked files are ignored)
    fn is_dirty(&self) -> Result<bool>;

    /// Current branch name, or `None` on a detached HEAD
    fn current_branch(&self) -> Result<Option<String>>;

    fn head_commit(&self) -> Result<String>;

    /// Commit a tag points at, if the tag exists
    fn find_tag(&self, name: &str) -> Result<Option<String>>;

    fn create_tag(&self, name: &str, target: &str) -> Result<()>;

    fn delete_tag(&self, name: &str) -> Result<()>;

    /// Whether `commit` is the tip of `branch` or one of its ancestors
    fn branch_contains(&self, branch: &str, commit: &str) -> Result<bool>;

    fn branches_containing(&self, commit: &str) -> Result<Vec<String>>;

    /// Commits in `base..HEAD`, oldest first
    fn commits_since(&self, base: &str) -> Result<Vec<CommitInfo>>;

    fn apply_patch(
        &self,
        patch: &Path,
        tool: ApplyTool,
        three_way: bool,
        context_lines: u32,
    ) -> Result<ApplyOutcome>;

    /// Abandon an in-progress `git am` session
    fn abort_mailbox(&self) -> Result<()>;

    /// Untracked, non-ignored files, relative to the working tree root
    fn untracked_files(&self) -> Result<Vec<PathBuf>>;

    /// Stage every change to tracked files, plus untracked files that are
    /// not listed in `preexisting`.
    fn stage_changes(&self, preexisting: &[PathBuf]) -> Result<()>;

    /// Commit the index on top of HEAD, returning the new commit id
    fn commit(&self, message: &str) -> Result<String>;

    fn head_message(&self) -> Result<String>;

    /// Rewrite HEAD's message, returning the new commit id
    fn amend_head_message(&self, message: &str) -> Result<String>;

    /// Render one commit as a mailbox patch (`git format-patch` output)
    fn format_patch(&self, commit: &str) -> Result<String>;

    fn branch_exists(&self, name: &str) -> Result<bool>;

    fn create_branch(&self, name: &str, target: &str) -> Result<()>;

    fn reset_hard(&self, target: &str) -> Result<()>;

    /// Run an executable with the working tree as its current directory
    fn run_script(&self, script: &Path) -> Result<ScriptOutcome>;

    /// Write a file in the working tree, creating parent directories
    fn write_file(&self, path: &Path, contents: &str) -> Result<()>;

    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Find the root of the Git repository
pub fn find_repository_root(start_path: &Path) -> Result<PathBuf> {
    let repo = git2::Repository::discover(start_path).map_err(PatchStackError::Git)?;

    let workdir = repo.workdir().ok_or_else(|| {
        PatchStackError::config("Repository has no working directory (bare repo?)")
    })?;

    Ok(workdir.to_path_buf())
}

/// Run a script, capturing its output for the debug log
pub(crate) fn run_script_in(dir: &Path, script: &Path) -> Result<ScriptOutcome> {
    tracing::debug!("$ {}", script.display());
    let output = std::process::Command::new(script)
        .current_dir(dir)
        .output()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
        tracing::debug!("{}", stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        tracing::debug!("{}", stderr.trim_end());
    }

    Ok(ScriptOutcome {
        success: output.status.success(),
        status: output.status.to_string(),
    })
}

pub(crate) fn write_file_in(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}
