use crate::cli::commands::target_dir;
use crate::cli::output::Output;
use crate::config::load_settings;
use crate::errors::Result;
use crate::git::{DryRun, GitRepository, VersionControl};
use crate::stack::format_patches;
use std::path::PathBuf;

/// Handle `patchstack format`
pub fn run(path: Option<PathBuf>, backup_branch: bool, dry_run: bool) -> Result<()> {
    let repo = GitRepository::open(&target_dir(path)?)?;
    let settings = load_settings(repo.workdir())?;

    let report = if dry_run {
        format_patches(&DryRun::new(repo), &settings, backup_branch)?
    } else {
        format_patches(&repo, &settings, backup_branch)?
    };

    let prefix = if dry_run { "[dry-run] " } else { "" };
    if let Some(branch) = &report.backup_branch {
        Output::info(format!("{prefix}Backed up the stack to branch {branch}"));
    }
    Output::success(format!(
        "{prefix}Formatted {} patch(es); branch reset to {}",
        report.written.len(),
        &report.marker_commit[..report.marker_commit.len().min(12)]
    ));
    for path in &report.written {
        Output::sub_item(path.display());
    }
    Ok(())
}
