use crate::errors::Result;
use crate::git::{ApplyOutcome, ApplyTool, CommitInfo, ScriptOutcome, VersionControl};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use tracing::info;

/// Commit id reported for commits that were only simulated
pub const DRY_RUN_COMMIT: &str = "(dry-run)";

/// Decorator that performs every read against the wrapped handle and only
/// logs the mutations it would have made.
pub struct DryRun<R> {
    inner: R,
    /// Message of the most recent simulated commit, so that HEAD reads stay
    /// consistent with what the run believes it created.
    simulated_head: RefCell<Option<String>>,
}

impl<R: VersionControl> DryRun<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            simulated_head: RefCell::new(None),
        }
    }
}

impl<R: VersionControl> VersionControl for DryRun<R> {
    fn workdir(&self) -> &Path {
        self.inner.workdir()
    }

    fn is_dirty(&self) -> Result<bool> {
        self.inner.is_dirty()
    }

    fn current_branch(&self) -> Result<Option<String>> {
        self.inner.current_branch()
    }

    fn head_commit(&self) -> Result<String> {
        if self.simulated_head.borrow().is_some() {
            return Ok(DRY_RUN_COMMIT.to_string());
        }
        self.inner.head_commit()
    }

    fn find_tag(&self, name: &str) -> Result<Option<String>> {
        self.inner.find_tag(name)
    }

    fn create_tag(&self, name: &str, target: &str) -> Result<()> {
        info!("[dry-run] git tag {} {}", name, target);
        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        info!("[dry-run] git tag -d {}", name);
        Ok(())
    }

    fn branch_contains(&self, branch: &str, commit: &str) -> Result<bool> {
        self.inner.branch_contains(branch, commit)
    }

    fn branches_containing(&self, commit: &str) -> Result<Vec<String>> {
        self.inner.branches_containing(commit)
    }

    fn commits_since(&self, base: &str) -> Result<Vec<CommitInfo>> {
        self.inner.commits_since(base)
    }

    fn apply_patch(
        &self,
        patch: &Path,
        tool: ApplyTool,
        three_way: bool,
        context_lines: u32,
    ) -> Result<ApplyOutcome> {
        let mut flags = tool.mode_flags().join(" ");
        if !flags.is_empty() {
            flags.push(' ');
        }
        info!(
            "[dry-run] git {} {}-C{} {}{}",
            tool.command_name(),
            flags,
            context_lines,
            patch.display(),
            if three_way { " --3way" } else { "" }
        );
        if tool == ApplyTool::Mailbox {
            *self.simulated_head.borrow_mut() = Some(String::new());
        }
        Ok(ApplyOutcome::Applied)
    }

    fn abort_mailbox(&self) -> Result<()> {
        info!("[dry-run] git am --abort");
        Ok(())
    }

    fn untracked_files(&self) -> Result<Vec<PathBuf>> {
        self.inner.untracked_files()
    }

    fn stage_changes(&self, preexisting: &[PathBuf]) -> Result<()> {
        info!(
            "[dry-run] git add --update, plus new files other than {} already untracked",
            preexisting.len()
        );
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        info!(
            "[dry-run] git commit -m {:?}",
            message.lines().next().unwrap_or_default()
        );
        *self.simulated_head.borrow_mut() = Some(message.to_string());
        Ok(DRY_RUN_COMMIT.to_string())
    }

    fn head_message(&self) -> Result<String> {
        if let Some(message) = self.simulated_head.borrow().as_ref() {
            return Ok(message.clone());
        }
        self.inner.head_message()
    }

    fn amend_head_message(&self, message: &str) -> Result<String> {
        info!("[dry-run] git commit --amend (rewrite message)");
        *self.simulated_head.borrow_mut() = Some(message.to_string());
        Ok(DRY_RUN_COMMIT.to_string())
    }

    fn format_patch(&self, commit: &str) -> Result<String> {
        self.inner.format_patch(commit)
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        self.inner.branch_exists(name)
    }

    fn create_branch(&self, name: &str, target: &str) -> Result<()> {
        info!("[dry-run] git branch {} {}", name, target);
        Ok(())
    }

    fn reset_hard(&self, target: &str) -> Result<()> {
        info!("[dry-run] git reset --hard {}", target);
        Ok(())
    }

    fn run_script(&self, script: &Path) -> Result<ScriptOutcome> {
        info!("[dry-run] {}", script.display());
        Ok(ScriptOutcome {
            success: true,
            status: "not run".to_string(),
        })
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        info!("[dry-run] write {} ({} bytes)", path.display(), contents.len());
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
