use crate::cli::commands::{absolute, target_dir};
use crate::cli::output::Output;
use crate::config::{load_settings, Settings};
use crate::errors::{PatchStackError, Result};
use crate::git::{DryRun, GitRepository, UnversionedTree, VersionControl};
use crate::stack::{apply_patches, ApplyMode, ApplyRequest, RunReport};
use std::path::{Path, PathBuf};

pub struct ApplyArgs {
    pub path: Option<PathBuf>,
    pub ebuild: bool,
    pub no_commit: bool,
    pub first: Option<String>,
    pub last: Option<String>,
    pub dry_run: bool,
    pub patch_dir: Option<PathBuf>,
}

/// Handle `patchstack apply`
pub fn run(args: ApplyArgs) -> Result<()> {
    let dir = target_dir(args.path)?;
    let request = ApplyRequest {
        mode: if args.ebuild {
            ApplyMode::Unversioned
        } else {
            ApplyMode::Normal
        },
        no_commit: args.no_commit || args.ebuild,
        first: args.first,
        last: args.last,
    };

    let result = if args.ebuild {
        let tree = UnversionedTree::new(&dir)?;
        let settings = settings_for(tree.workdir(), args.patch_dir.as_deref())?;
        execute(tree, &settings, &request, args.dry_run)
    } else {
        let repo = GitRepository::open(&dir)?;
        let settings = settings_for(repo.workdir(), args.patch_dir.as_deref())?;
        execute(repo, &settings, &request, args.dry_run)
    };
    let report = result.inspect_err(|err| {
        if err.is_stack_integrity() {
            Output::tip("Inspect the commits above the marker tag with `git log`, then fix or delete the tag.");
        }
    })?;

    print_report(&report);
    report.into_result().map(|_| ())
}

fn settings_for(tree: &Path, patch_dir: Option<&Path>) -> Result<Settings> {
    let mut settings = load_settings(tree)?;
    if let Some(dir) = patch_dir {
        settings.patches.directory = absolute(dir)?.to_string_lossy().into_owned();
    }
    Ok(settings)
}

fn execute<R: VersionControl>(
    vcs: R,
    settings: &Settings,
    request: &ApplyRequest,
    dry_run: bool,
) -> Result<RunReport> {
    if dry_run {
        apply_patches(&DryRun::new(vcs), settings, request)
    } else {
        apply_patches(&vcs, settings, request)
    }
}

fn print_report(report: &RunReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };

    if report.marker_created {
        Output::info(format!("{prefix}Tagged HEAD as the start of a new patch stack"));
    }

    if report.is_success() {
        if report.applied.is_empty() {
            Output::success(format!("{prefix}Nothing to apply; the stack is up to date"));
        } else {
            Output::success(format!(
                "{prefix}Applied {} patch(es), {} commit(s) created",
                report.applied.len(),
                report.commits.len()
            ));
            for name in &report.applied {
                Output::sub_item(name);
            }
        }
        return;
    }

    if let Some(err) = &report.failure {
        if !report.applied.is_empty() {
            Output::info(format!(
                "{prefix}Applied {} patch(es) before stopping:",
                report.applied.len()
            ));
            for name in &report.applied {
                Output::sub_item(name);
            }
        }
        if matches!(err, PatchStackError::ApplyConflict { .. }) {
            Output::tip("Resolve the conflict and commit it, then rerun apply to continue.");
        } else if err.is_patch_failure() {
            Output::tip("Fix the patch, then rerun apply to continue from it.");
        }
    }
}
