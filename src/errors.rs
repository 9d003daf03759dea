use std::path::PathBuf;

/// A commit between the marker and HEAD that does not carry exactly one
/// patch descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignCommitInfo {
    pub commit_id: String,
    pub descriptors: Vec<String>,
}

impl std::fmt::Display for ForeignCommitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} patch-name trailer(s)",
            self.commit_id,
            self.descriptors.len()
        )?;
        if !self.descriptors.is_empty() {
            write!(f, " ({})", self.descriptors.join(", "))?;
        }
        Ok(())
    }
}

fn list_foreign(commits: &[ForeignCommitInfo]) -> String {
    commits
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Patch stack error types
#[derive(Debug, thiserror::Error)]
pub enum PatchStackError {
    /// Working tree has uncommitted changes to tracked files
    #[error("Git working directory is dirty. Commit or stash local changes before running.")]
    DirtyTree,

    /// HEAD does not point at a branch
    #[error("Not on a branch. Check out the branch carrying the patch stack.")]
    DetachedHead,

    /// A file or argument that does not follow `<category>-<NNNN>-<name>.<ext>`
    #[error("Invalid patch name '{name}': {reason}")]
    MalformedPatchName { name: String, reason: String },

    /// A --first/--last argument naming a patch that is not in the directory
    #[error("--{flag} ({name}) does not exist in {}", directory.display())]
    UnknownPatch {
        flag: String,
        name: String,
        directory: PathBuf,
    },

    /// No marker tag while one is required
    #[error(
        "Tag {tag} does not exist. Run `git tag {tag} <hash>` with the commit to reset to \
         if you have applied patches manually."
    )]
    MissingMarker { tag: String },

    /// The marker is not reachable from the branch being operated on
    #[error(
        "Tag '{tag}' is on branches ({}) which do not include current branch {branch}. \
         Confirm you are on the right branch, or delete the obsolete tag with `git tag -d {tag}`.",
        containing.join(", ")
    )]
    WrongBranch {
        tag: String,
        branch: String,
        containing: Vec<String>,
    },

    /// Commits between the marker and HEAD that were not produced by a patch
    #[error(
        "There are non-patch commits from {tag} to HEAD:\n{}\n\
         If the tag is obsolete, run `git tag -d {tag}` and rerun. Otherwise reword the \
         commits so each carries exactly one patch-name trailer.",
        list_foreign(commits)
    )]
    ForeignCommit {
        tag: String,
        commits: Vec<ForeignCommitInfo>,
    },

    /// Applied descriptors are not in canonical application order
    #[error(
        "Applied patches in git log are not in correct application order. \
         Resort them with `git rebase -i`.\nexpected: {}\nactual:   {}",
        expected.join(", "),
        actual.join(", ")
    )]
    OrderViolation {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Both direct and three-way application failed; conflict markers remain
    #[error(
        "Failed to git {tool} patch {patch}; please check 3-way merge markers and resolve conflicts."
    )]
    ApplyConflict { patch: String, tool: String },

    /// Direct application failed where no three-way retry is possible
    #[error("Failed to apply patch {patch}: {detail}")]
    ApplyFailed { patch: String, detail: String },

    /// A script-based patch exited unsuccessfully
    #[error("Patch script {patch} failed ({status}). Please fix.")]
    ScriptFailed { patch: String, status: String },

    /// --first is at or before the last applied patch
    #[error(
        "Invalid input --first {first}: first patch to apply should be after the last \
         patch commit ({last_applied}) in history."
    )]
    FirstPrecedesApplied { first: String, last_applied: String },

    /// --last is ordered before the effective first patch
    #[error(
        "Invalid input --last {last}: last patch to apply should not be applied before \
         the first one ({first})."
    )]
    RangeInverted { first: String, last: String },

    /// A script-based patch cannot be regenerated from its commit
    #[error(
        "Cannot format {patch}: script-based patches cannot be regenerated from a commit. \
         Drop or rework its commit before formatting."
    )]
    UnformattableScriptPatch { patch: String },

    /// Git-related errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// A git subprocess failed unexpectedly
    #[error("Command `{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl PatchStackError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        PatchStackError::Config(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        PatchStackError::Validation(msg.into())
    }

    pub fn malformed<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        PatchStackError::MalformedPatchName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn command<C: Into<String>, S: Into<String>>(command: C, stderr: S) -> Self {
        PatchStackError::Command {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether this error left a conflicted or partially modified tree behind
    pub fn is_patch_failure(&self) -> bool {
        matches!(
            self,
            PatchStackError::ApplyConflict { .. }
                | PatchStackError::ApplyFailed { .. }
                | PatchStackError::ScriptFailed { .. }
        )
    }

    /// Whether this error reports a corrupted or foreign stack
    pub fn is_stack_integrity(&self) -> bool {
        matches!(
            self,
            PatchStackError::MissingMarker { .. }
                | PatchStackError::WrongBranch { .. }
                | PatchStackError::ForeignCommit { .. }
                | PatchStackError::OrderViolation { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PatchStackError>;
