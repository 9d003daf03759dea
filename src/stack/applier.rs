use crate::config::Settings;
use crate::errors::{PatchStackError, Result};
use crate::git::{ApplyOutcome, ApplyTool, VersionControl};
use crate::stack::catalog::{PatchEntry, PatchKind};
use crate::stack::trailer;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Subject of the commit that records a script patch's changes
pub const SCRIPT_COMMIT_SUBJECT: &str = "Temporary commit for script-based patch";

/// Where patches are being applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// A git checkout; history is recorded
    Normal,
    /// A bare source tree (ebuild); changes are only made to files
    Unversioned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    pub mode: ApplyMode,
    /// Record one commit per patch. Always off in unversioned mode.
    pub commit: bool,
    /// Lines of context `git am`/`git apply` must match (`-C<n>`)
    pub context_lines: u32,
}

impl ApplyOptions {
    pub fn new(mode: ApplyMode, no_commit: bool, settings: &Settings) -> Self {
        Self {
            mode,
            commit: mode == ApplyMode::Normal && !no_commit,
            context_lines: settings.git.context_lines,
        }
    }
}

/// Applies single patches to the tree behind a [`VersionControl`] handle.
pub struct PatchApplier<'a> {
    vcs: &'a dyn VersionControl,
    options: ApplyOptions,
    trailer_key: &'a str,
}

impl<'a> PatchApplier<'a> {
    pub fn new(vcs: &'a dyn VersionControl, options: ApplyOptions, trailer_key: &'a str) -> Self {
        Self {
            vcs,
            options,
            trailer_key,
        }
    }

    /// Apply one patch. Returns the commit created for it, if any.
    pub fn apply(&self, entry: &PatchEntry) -> Result<Option<String>> {
        info!("Applying {}...", entry.file_name());
        match entry.kind {
            PatchKind::Diff => self.apply_diff(entry),
            PatchKind::Script => self.apply_script(entry),
        }
    }

    fn apply_diff(&self, entry: &PatchEntry) -> Result<Option<String>> {
        let patch = entry.file_name();

        match (self.options.mode, self.options.commit) {
            (ApplyMode::Unversioned, _) => {
                let outcome = self.vcs.apply_patch(
                    &entry.path,
                    ApplyTool::Worktree,
                    false,
                    self.options.context_lines,
                )?;
                match outcome {
                    ApplyOutcome::Applied => Ok(None),
                    ApplyOutcome::Rejected { stderr } => Err(PatchStackError::ApplyFailed {
                        patch: patch.to_string(),
                        detail: stderr,
                    }),
                }
            }
            (ApplyMode::Normal, false) => {
                self.apply_with_retry(entry, ApplyTool::Worktree)?;
                Ok(None)
            }
            (ApplyMode::Normal, true) if is_mailbox(&entry.path)? => {
                self.apply_with_retry(entry, ApplyTool::Mailbox)?;
                self.sync_descriptor(patch).map(Some)
            }
            (ApplyMode::Normal, true) => {
                // --index stages exactly the files the diff touches.
                self.apply_with_retry(entry, ApplyTool::Index)?;
                self.commit_staged(&format!("Apply {patch}"), patch)
                    .map(Some)
            }
        }
    }

    /// Two-way first, then one three-way attempt that leaves conflict
    /// markers behind when it fails. A diff without blob ids cannot be
    /// merged three-way, so its two-way failure is final.
    fn apply_with_retry(&self, entry: &PatchEntry, tool: ApplyTool) -> Result<()> {
        let context = self.options.context_lines;
        let stderr = match self.vcs.apply_patch(&entry.path, tool, false, context)? {
            ApplyOutcome::Applied => return Ok(()),
            ApplyOutcome::Rejected { stderr } => stderr,
        };

        if tool == ApplyTool::Mailbox {
            // A failed `git am` leaves its session behind even without --3way.
            self.vcs.abort_mailbox()?;
        }
        if !has_blob_ids(&entry.path)? {
            return Err(PatchStackError::ApplyFailed {
                patch: entry.file_name().to_string(),
                detail: format!(
                    "{stderr}\nThe patch has no `index` lines, so a three-way merge is not possible. \
                     Regenerate it with `git format-patch` or `git diff --full-index`."
                ),
            });
        }
        warn!(
            "git {} could not apply {} cleanly, retrying with --3way",
            tool.command_name(),
            entry.file_name()
        );

        match self.vcs.apply_patch(&entry.path, tool, true, context)? {
            ApplyOutcome::Applied => Ok(()),
            ApplyOutcome::Rejected { stderr } => {
                debug!("{}", stderr);
                Err(PatchStackError::ApplyConflict {
                    patch: entry.file_name().to_string(),
                    tool: tool.command_name().to_string(),
                })
            }
        }
    }

    /// Make HEAD carry exactly one descriptor equal to the patch file name.
    fn sync_descriptor(&self, patch: &str) -> Result<String> {
        let message = self.vcs.head_message()?;
        let existing = trailer::descriptors(&message, self.trailer_key)?;
        if existing.len() == 1 && existing[0] == patch {
            return self.vcs.head_commit();
        }

        if !existing.is_empty() {
            warn!(
                "Applied patch contains {} trailers ({}) different from filename ({}). \
                 Overwriting with filename.",
                self.trailer_key,
                existing.join(", "),
                patch
            );
        }
        self.vcs
            .amend_head_message(&trailer::set_descriptor(&message, self.trailer_key, patch))
    }

    fn apply_script(&self, entry: &PatchEntry) -> Result<Option<String>> {
        // Files that were untracked before the script ran stay out of its commit.
        let preexisting = if self.options.commit {
            self.vcs.untracked_files()?
        } else {
            Vec::new()
        };

        let outcome = self.vcs.run_script(&entry.path)?;
        if !outcome.success {
            return Err(PatchStackError::ScriptFailed {
                patch: entry.file_name().to_string(),
                status: outcome.status,
            });
        }

        if !self.options.commit {
            return Ok(None);
        }
        self.vcs.stage_changes(&preexisting)?;
        self.commit_staged(SCRIPT_COMMIT_SUBJECT, entry.file_name())
            .map(Some)
    }

    fn commit_staged(&self, subject: &str, patch: &str) -> Result<String> {
        let message = trailer::set_descriptor(subject, self.trailer_key, patch);
        self.vcs.commit(&message)
    }
}

/// Whether a diff records the pre- and post-image blob ids (`index a..b`)
/// that a three-way merge needs.
pub fn has_blob_ids(path: &Path) -> Result<bool> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.lines().any(|line| {
        line.strip_prefix("index ")
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|ids| ids.split_once(".."))
            .is_some_and(|(before, after)| {
                !before.is_empty()
                    && !after.is_empty()
                    && before
                        .chars()
                        .chain(after.chars())
                        .all(|c| c.is_ascii_hexdigit())
            })
    }))
}

/// Whether a patch file is `git format-patch` output that `git am` accepts.
pub fn is_mailbox(path: &Path) -> Result<bool> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    if text.starts_with("From ") {
        return Ok(true);
    }
    Ok(text
        .lines()
        .take_while(|line| !line.trim().is_empty())
        .any(|line| line.starts_with("Subject:")))
}
