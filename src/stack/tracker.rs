use crate::config::Settings;
use crate::errors::{ForeignCommitInfo, PatchStackError, Result};
use crate::git::VersionControl;
use crate::stack::catalog::{PatchCatalog, PatchName};
use crate::stack::trailer;
use tracing::{debug, info};

/// A commit on the stack and the patch that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPatchCommit {
    pub commit_id: String,
    pub patch_name: String,
}

/// Validated state of the stack on the current branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedStack {
    /// Commit the marker tag points at
    pub marker_commit: String,
    /// Patch commits from the marker (exclusive) to HEAD, oldest first
    pub commits: Vec<AppliedPatchCommit>,
    /// Whether the marker was created by this call
    pub created: bool,
}

impl AppliedStack {
    pub fn patch_names(&self) -> Vec<String> {
        self.commits.iter().map(|c| c.patch_name.clone()).collect()
    }
}

/// Recovers which patches are already applied, from the marker tag and the
/// descriptor trailer of each commit after it. The applied stack is only
/// valid while it matches the leading entries of `catalog`.
pub struct StackTracker<'a> {
    vcs: &'a dyn VersionControl,
    marker_tag: &'a str,
    trailer_key: &'a str,
    catalog: &'a PatchCatalog,
}

impl<'a> StackTracker<'a> {
    pub fn new(
        vcs: &'a dyn VersionControl,
        settings: &'a Settings,
        catalog: &'a PatchCatalog,
    ) -> Self {
        Self {
            vcs,
            marker_tag: &settings.git.marker_tag,
            trailer_key: &settings.git.trailer_key,
            catalog,
        }
    }

    /// Commit the marker points at, if it exists
    pub fn marker_commit(&self) -> Result<Option<String>> {
        self.vcs.find_tag(self.marker_tag)
    }

    /// Validate the stack without mutating anything. `None` means no marker.
    pub fn inspect(&self, branch: &str) -> Result<Option<AppliedStack>> {
        let Some(marker) = self.marker_commit()? else {
            return Ok(None);
        };
        info!("Tag {} already exists: {}.", self.marker_tag, marker);

        if !self.vcs.branch_contains(branch, &marker)? {
            return Err(PatchStackError::WrongBranch {
                tag: self.marker_tag.to_string(),
                branch: branch.to_string(),
                containing: self.vcs.branches_containing(&marker)?,
            });
        }

        let mut applied = Vec::new();
        let mut foreign = Vec::new();
        for commit in self.vcs.commits_since(&marker)? {
            let descriptors = trailer::descriptors(&commit.message, self.trailer_key)?;
            let is_patch_commit = descriptors.len() == 1
                && PatchName::parse(&descriptors[0], self.catalog.order()).is_ok();

            if is_patch_commit {
                debug!("{} <- {}", commit.short_id(), descriptors[0]);
                applied.push(AppliedPatchCommit {
                    commit_id: commit.id,
                    patch_name: descriptors[0].clone(),
                });
            } else {
                foreign.push(ForeignCommitInfo {
                    commit_id: commit.id,
                    descriptors,
                });
            }
        }

        if !foreign.is_empty() {
            return Err(PatchStackError::ForeignCommit {
                tag: self.marker_tag.to_string(),
                commits: foreign,
            });
        }
        info!("Confirmed only patch commits from {} to HEAD.", self.marker_tag);
        info!("{} commits since {}.", applied.len(), self.marker_tag);

        let names: Vec<String> = applied.iter().map(|c| c.patch_name.clone()).collect();
        check_order(&names, self.catalog)?;

        Ok(Some(AppliedStack {
            marker_commit: marker,
            commits: applied,
            created: false,
        }))
    }

    /// Validate the stack, tagging HEAD as the marker when there is none and
    /// `auto_create` is set.
    pub fn recover_applied_state(&self, branch: &str, auto_create: bool) -> Result<AppliedStack> {
        if let Some(stack) = self.inspect(branch)? {
            return Ok(stack);
        }

        if !auto_create {
            return Err(PatchStackError::MissingMarker {
                tag: self.marker_tag.to_string(),
            });
        }

        let marker_commit = self.ensure_marker()?;
        Ok(AppliedStack {
            marker_commit,
            commits: Vec::new(),
            created: true,
        })
    }

    /// Tag the current HEAD as the marker, returning the tagged commit
    pub fn ensure_marker(&self) -> Result<String> {
        let head = self.vcs.head_commit()?;
        self.vcs.create_tag(self.marker_tag, &head)?;
        info!("Tagged current HEAD as {}.", self.marker_tag);
        Ok(head)
    }
}

/// Applied descriptors must be the leading entries of `catalog`, one for
/// one. Entries are matched by order key, so a descriptor whose patch file
/// was renamed since it was applied still lines up.
pub fn check_order(names: &[String], catalog: &PatchCatalog) -> Result<()> {
    let mut keyed = Vec::with_capacity(names.len());
    for name in names {
        keyed.push((PatchName::parse(name, catalog.order())?.order_key(), name.clone()));
    }

    let ascending = keyed.windows(2).all(|pair| pair[0].0 < pair[1].0);
    if !ascending {
        let mut expected = keyed.clone();
        expected.sort_by_key(|(key, _)| *key);
        return Err(PatchStackError::OrderViolation {
            expected: expected.into_iter().map(|(_, name)| name).collect(),
            actual: names.to_vec(),
        });
    }

    let entries = catalog.entries();
    let is_prefix = keyed.len() <= entries.len()
        && keyed
            .iter()
            .zip(entries)
            .all(|((key, _), entry)| *key == entry.order_key());
    if !is_prefix {
        return Err(PatchStackError::OrderViolation {
            expected: entries
                .iter()
                .take(names.len())
                .map(|e| e.file_name().to_string())
                .collect(),
            actual: names.to_vec(),
        });
    }

    Ok(())
}
