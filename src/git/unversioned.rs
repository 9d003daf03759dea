use crate::errors::{PatchStackError, Result};
use crate::git::command::run_git;
use crate::git::{ApplyOutcome, ApplyTool, CommitInfo, ScriptOutcome, VersionControl};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// A source tree that is not a git checkout, as unpacked by an ebuild.
///
/// Only tree-level operations work here: `git apply` (two-way only), running
/// scripts and writing files. Anything touching history is an error.
pub struct UnversionedTree {
    path: PathBuf,
}

impl UnversionedTree {
    pub fn new(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(PatchStackError::config(format!(
                "Target directory {} does not exist",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn unsupported<T>(&self, operation: &str) -> Result<T> {
        Err(PatchStackError::validation(format!(
            "Cannot {operation}: {} is not under version control",
            self.path.display()
        )))
    }
}

impl VersionControl for UnversionedTree {
    fn workdir(&self) -> &Path {
        &self.path
    }

    fn is_dirty(&self) -> Result<bool> {
        self.unsupported("check for local changes")
    }

    fn current_branch(&self) -> Result<Option<String>> {
        self.unsupported("read the current branch")
    }

    fn head_commit(&self) -> Result<String> {
        self.unsupported("read HEAD")
    }

    fn find_tag(&self, _name: &str) -> Result<Option<String>> {
        self.unsupported("look up tags")
    }

    fn create_tag(&self, _name: &str, _target: &str) -> Result<()> {
        self.unsupported("create tags")
    }

    fn delete_tag(&self, _name: &str) -> Result<()> {
        self.unsupported("delete tags")
    }

    fn branch_contains(&self, _branch: &str, _commit: &str) -> Result<bool> {
        self.unsupported("walk branches")
    }

    fn branches_containing(&self, _commit: &str) -> Result<Vec<String>> {
        self.unsupported("walk branches")
    }

    fn commits_since(&self, _base: &str) -> Result<Vec<CommitInfo>> {
        self.unsupported("walk history")
    }

    fn apply_patch(
        &self,
        patch: &Path,
        tool: ApplyTool,
        three_way: bool,
        context_lines: u32,
    ) -> Result<ApplyOutcome> {
        if tool != ApplyTool::Worktree || three_way {
            return self.unsupported("apply with commit history");
        }

        let context = format!("-C{context_lines}");
        let args: [&OsStr; 3] = [
            OsStr::new("apply"),
            OsStr::new(&context),
            patch.as_os_str(),
        ];
        let output = run_git(&self.path, args)?;
        if output.success {
            Ok(ApplyOutcome::Applied)
        } else {
            Ok(ApplyOutcome::Rejected {
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    fn abort_mailbox(&self) -> Result<()> {
        self.unsupported("abort git am")
    }

    fn untracked_files(&self) -> Result<Vec<PathBuf>> {
        self.unsupported("list untracked files")
    }

    fn stage_changes(&self, _preexisting: &[PathBuf]) -> Result<()> {
        self.unsupported("stage changes")
    }

    fn commit(&self, _message: &str) -> Result<String> {
        self.unsupported("commit")
    }

    fn head_message(&self) -> Result<String> {
        self.unsupported("read commit messages")
    }

    fn amend_head_message(&self, _message: &str) -> Result<String> {
        self.unsupported("amend commits")
    }

    fn format_patch(&self, _commit: &str) -> Result<String> {
        self.unsupported("format patches")
    }

    fn branch_exists(&self, _name: &str) -> Result<bool> {
        self.unsupported("look up branches")
    }

    fn create_branch(&self, _name: &str, _target: &str) -> Result<()> {
        self.unsupported("create branches")
    }

    fn reset_hard(&self, _target: &str) -> Result<()> {
        self.unsupported("reset")
    }

    fn run_script(&self, script: &Path) -> Result<ScriptOutcome> {
        super::run_script_in(&self.path, script)
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        super::write_file_in(path, contents)
    }
}
