use crate::cli::commands::target_dir;
use crate::cli::output::Output;
use crate::config::load_settings;
use crate::errors::Result;
use crate::git::{GitRepository, VersionControl};
use crate::stack::status as stack_status;
use console::style;
use std::path::PathBuf;

/// Show the applied and pending patches of the current branch
pub fn run(path: Option<PathBuf>) -> Result<()> {
    let repo = GitRepository::open(&target_dir(path)?)?;
    let settings = load_settings(repo.workdir())?;
    let status = stack_status(&repo, &settings)?;

    Output::section("Patch stack");
    Output::sub_item(format!("Branch: {}", style(&status.branch).cyan()));
    match &status.marker_commit {
        Some(commit) => Output::sub_item(format!(
            "{}: {}",
            settings.git.marker_tag,
            &commit[..commit.len().min(12)]
        )),
        None => Output::sub_item(format!("{}: (not set)", settings.git.marker_tag)),
    }
    if status.dirty {
        Output::warning("Working directory has uncommitted changes");
    }

    Output::section(format!("Applied ({})", status.applied.len()));
    for (i, name) in status.applied.iter().enumerate() {
        if status.missing_from_catalog.contains(name) {
            Output::numbered_item(i + 1, format!("{name} {}", style("(not in patch directory)").yellow()));
        } else {
            Output::numbered_item(i + 1, name);
        }
    }

    Output::section(format!("Pending ({})", status.pending.len()));
    for name in &status.pending {
        Output::bullet(name);
    }

    if !status.missing_from_catalog.is_empty() {
        Output::tip("Run `patchstack format` to write renamed patches back to the patch directory.");
    }
    Ok(())
}
