//! Run-level orchestration of `apply`, `format` and `status`.
//!
//! Everything that can be rejected up front (catalog, range bounds, tree
//! state, stack integrity) is checked before the first mutation. Once
//! patches start applying, the first failure ends the run and every commit
//! made before it stays in place so that a later run can resume.

use crate::config::Settings;
use crate::errors::{PatchStackError, Result};
use crate::git::VersionControl;
use crate::stack::applier::{ApplyMode, ApplyOptions, PatchApplier};
use crate::stack::catalog::PatchCatalog;
use crate::stack::formatter::{FormatReport, StackFormatter};
use crate::stack::range::{clamp, resolve_bound};
use crate::stack::tracker::{check_order, StackTracker};
use tracing::{debug, info};

/// States of one `apply` run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    Applying,
    Committed,
    Completed,
    Conflict,
    Failed,
}

/// Parameters of an `apply` invocation
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub mode: ApplyMode,
    pub no_commit: bool,
    /// Catalog file name or path of the first patch to apply
    pub first: Option<String>,
    /// Catalog file name or path of the last patch to apply
    pub last: Option<String>,
}

impl Default for ApplyRequest {
    fn default() -> Self {
        Self {
            mode: ApplyMode::Normal,
            no_commit: false,
            first: None,
            last: None,
        }
    }
}

/// Outcome of an `apply` run that got past validation
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    /// Patches applied by this run, in order
    pub applied: Vec<String>,
    /// Commits created by this run
    pub commits: Vec<String>,
    /// Whether this run tagged HEAD as the marker
    pub marker_created: bool,
    pub dry_run: bool,
    /// The error that ended the run in `Conflict` or `Failed`
    pub failure: Option<PatchStackError>,
}

impl RunReport {
    fn new(dry_run: bool) -> Self {
        Self {
            state: RunState::Idle,
            applied: Vec::new(),
            commits: Vec::new(),
            marker_created: false,
            dry_run,
            failure: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Turn a failed run back into its error.
    pub fn into_result(mut self) -> Result<Self> {
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    fn advance(&mut self, next: RunState) {
        debug!("run state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// What is on the stack right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackStatus {
    pub branch: String,
    pub dirty: bool,
    pub marker_commit: Option<String>,
    /// Descriptors of the commits above the marker
    pub applied: Vec<String>,
    /// Catalog entries after the resume point
    pub pending: Vec<String>,
    /// Applied descriptors that no longer name a catalog file
    pub missing_from_catalog: Vec<String>,
}

/// A clean tree with a branch checked out, returning that branch.
pub fn validate_worktree(vcs: &dyn VersionControl) -> Result<String> {
    if vcs.is_dirty()? {
        return Err(PatchStackError::DirtyTree);
    }
    vcs.current_branch()?.ok_or(PatchStackError::DetachedHead)
}

/// Apply the selected part of the catalog on top of the current stack.
pub fn apply_patches(
    vcs: &dyn VersionControl,
    settings: &Settings,
    request: &ApplyRequest,
) -> Result<RunReport> {
    let mut report = RunReport::new(vcs.is_dry_run());
    report.advance(RunState::Validating);

    let patch_dir = settings.patch_dir(vcs.workdir());
    let catalog = PatchCatalog::enumerate(&patch_dir, &settings.category_order())?;
    let first = request
        .first
        .as_deref()
        .map(|value| resolve_bound("first", value, &patch_dir, &catalog))
        .transpose()?;
    let last = request
        .last
        .as_deref()
        .map(|value| resolve_bound("last", value, &patch_dir, &catalog))
        .transpose()?;

    let tracker = StackTracker::new(vcs, settings, &catalog);
    let options = ApplyOptions::new(request.mode, request.no_commit, settings);

    let mut already_applied = Vec::new();
    let mut needs_marker = false;
    if request.mode == ApplyMode::Normal {
        let branch = validate_worktree(vcs)?;
        match tracker.inspect(&branch)? {
            Some(stack) => already_applied = stack.patch_names(),
            None => needs_marker = true,
        }
    } else {
        info!("In ebuild mode, --no-commit is always set.");
    }

    let range = clamp(&catalog, &already_applied, first.as_deref(), last.as_deref())?;
    if options.commit {
        // The commits this run makes must still be a catalog prefix afterwards.
        let planned: Vec<String> = already_applied
            .iter()
            .cloned()
            .chain(range.iter().map(|e| e.file_name().to_string()))
            .collect();
        check_order(&planned, &catalog)?;
    }

    if needs_marker {
        tracker.ensure_marker()?;
        report.marker_created = true;
    }

    if range.is_empty() {
        info!("No patches to apply.");
    }

    let applier = PatchApplier::new(vcs, options, &settings.git.trailer_key);
    for entry in range.iter() {
        report.advance(RunState::Applying);
        match applier.apply(entry) {
            Ok(commit) => {
                report.applied.push(entry.file_name().to_string());
                if let Some(commit) = commit {
                    report.commits.push(commit);
                    report.advance(RunState::Committed);
                }
            }
            Err(err) => {
                let terminal = if matches!(err, PatchStackError::ApplyConflict { .. }) {
                    RunState::Conflict
                } else {
                    RunState::Failed
                };
                report.advance(terminal);
                report.failure = Some(err);
                return Ok(report);
            }
        }
    }

    report.advance(RunState::Completed);
    Ok(report)
}

/// Turn the stack back into patch files.
pub fn format_patches(
    vcs: &dyn VersionControl,
    settings: &Settings,
    backup_branch: bool,
) -> Result<FormatReport> {
    let branch = validate_worktree(vcs)?;
    StackFormatter::new(vcs, settings).format(&branch, backup_branch)
}

/// Describe the stack without changing anything.
pub fn status(vcs: &dyn VersionControl, settings: &Settings) -> Result<StackStatus> {
    let branch = vcs.current_branch()?.ok_or(PatchStackError::DetachedHead)?;
    let dirty = vcs.is_dirty()?;

    let catalog = PatchCatalog::enumerate(
        &settings.patch_dir(vcs.workdir()),
        &settings.category_order(),
    )?;
    let stack = StackTracker::new(vcs, settings, &catalog).inspect(&branch)?;

    let (marker_commit, applied) = match stack {
        Some(stack) => {
            let applied = stack.patch_names();
            (Some(stack.marker_commit), applied)
        }
        None => (None, Vec::new()),
    };

    let pending = clamp(&catalog, &applied, None, None)?
        .iter()
        .map(|e| e.file_name().to_string())
        .collect();
    let missing_from_catalog = applied
        .iter()
        .filter(|name| catalog.find(name).is_none())
        .cloned()
        .collect();

    Ok(StackStatus {
        branch,
        dirty,
        marker_commit,
        applied,
        pending,
        missing_from_catalog,
    })
}
