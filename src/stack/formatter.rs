use crate::config::Settings;
use crate::errors::{PatchStackError, Result};
use crate::git::VersionControl;
use crate::stack::catalog::{PatchCatalog, PatchName};
use crate::stack::tracker::StackTracker;
use chrono::Local;
use std::path::PathBuf;
use tracing::info;

/// What `format` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatReport {
    /// Branch preserving the stack commits, when one was requested
    pub backup_branch: Option<String>,
    /// Commit the branch was reset to
    pub marker_commit: String,
    /// Patch files written, oldest commit first
    pub written: Vec<PathBuf>,
}

/// Turns the commits above the marker back into patch files.
pub struct StackFormatter<'a> {
    vcs: &'a dyn VersionControl,
    settings: &'a Settings,
}

impl<'a> StackFormatter<'a> {
    pub fn new(vcs: &'a dyn VersionControl, settings: &'a Settings) -> Self {
        Self { vcs, settings }
    }

    /// Regenerate patch files from the stack on `branch`, reset the branch to
    /// the marker and delete the marker.
    ///
    /// The caller is responsible for checking the tree is clean and `branch`
    /// is the checked out branch.
    pub fn format(&self, branch: &str, backup: bool) -> Result<FormatReport> {
        let tag = &self.settings.git.marker_tag;
        let patch_dir = self.settings.patch_dir(self.vcs.workdir());
        let catalog = PatchCatalog::enumerate(&patch_dir, &self.settings.category_order())?;
        let stack = StackTracker::new(self.vcs, self.settings, &catalog)
            .recover_applied_state(branch, false)?;

        for commit in &stack.commits {
            if !PatchName::parse(&commit.patch_name, catalog.order())?.is_diff() {
                return Err(PatchStackError::UnformattableScriptPatch {
                    patch: commit.patch_name.clone(),
                });
            }
        }

        let backup_branch = if backup {
            Some(self.create_backup_branch()?)
        } else {
            None
        };

        // Rendered before the reset, which discards the commits from the branch.
        let mut rendered = Vec::with_capacity(stack.commits.len());
        for commit in &stack.commits {
            rendered.push((
                commit.patch_name.as_str(),
                self.vcs.format_patch(&commit.commit_id)?,
            ));
        }
        info!("Formatted {} commits since {} as patches.", rendered.len(), tag);

        self.vcs.reset_hard(&stack.marker_commit)?;
        info!("Reset to {}.", tag);

        let mut written = Vec::with_capacity(rendered.len());
        for (name, text) in rendered {
            let path = patch_dir.join(name);
            self.vcs.write_file(&path, &text)?;
            written.push(path);
        }
        info!(
            "Moved and renamed formatted patches, please check {}.",
            patch_dir.display()
        );

        self.vcs.delete_tag(tag)?;
        info!("Deleted tag {}.", tag);

        Ok(FormatReport {
            backup_branch,
            marker_commit: stack.marker_commit,
            written,
        })
    }

    /// Point a new timestamped branch at HEAD without switching to it.
    fn create_backup_branch(&self) -> Result<String> {
        let prefix = &self.settings.git.backup_branch_prefix;
        let stamped = || format!("{prefix}-{}", Local::now().format("%Y%m%d%H%M%S"));

        let mut name = stamped();
        if self.vcs.branch_exists(&name)? {
            // Taken within the same second; a fresh stamp usually differs.
            let base = stamped();
            name = base.clone();
            let mut suffix = 1;
            while self.vcs.branch_exists(&name)? {
                name = format!("{base}-{suffix}");
                suffix += 1;
            }
        }

        let head = self.vcs.head_commit()?;
        self.vcs.create_branch(&name, &head)?;
        info!("Backed up git history to branch {}.", name);
        Ok(name)
    }
}
