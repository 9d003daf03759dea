use crate::errors::{PatchStackError, Result};
use crate::git::command::run_git;
use crate::git::{ApplyOutcome, ApplyTool, CommitInfo, ScriptOutcome, VersionControl};
use git2::{ErrorCode, Oid, Repository, Signature};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Wrapper around git2::Repository exposing the operations the stack needs
pub struct GitRepository {
    repo: Repository,
    path: PathBuf,
}

impl GitRepository {
    /// Open a Git repository at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| PatchStackError::config(format!("Not a git repository: {e}")))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| PatchStackError::config("Repository has no working directory"))?
            .to_path_buf();

        Ok(Self {
            repo,
            path: workdir,
        })
    }

    /// Resolve a branch name, tag or commit hash to a commit
    pub fn resolve_commit(&self, reference: &str) -> Result<git2::Commit<'_>> {
        if let Ok(oid) = Oid::from_str(reference) {
            if let Ok(commit) = self.repo.find_commit(oid) {
                return Ok(commit);
            }
        }

        let obj = self.repo.revparse_single(reference).map_err(|e| {
            PatchStackError::validation(format!("Could not resolve reference '{reference}': {e}"))
        })?;

        obj.peel_to_commit().map_err(|e| {
            PatchStackError::validation(format!(
                "Reference '{reference}' does not point to a commit: {e}"
            ))
        })
    }

    /// Get the HEAD commit object
    pub fn get_head_commit(&self) -> Result<git2::Commit<'_>> {
        let head = self
            .repo
            .head()
            .map_err(|e| PatchStackError::validation(format!("Could not get HEAD: {e}")))?;
        head.peel_to_commit()
            .map_err(|e| PatchStackError::validation(format!("Could not get HEAD commit: {e}")))
    }

    /// List all local branches
    pub fn list_branches(&self) -> Result<Vec<String>> {
        let branches = self.repo.branches(Some(git2::BranchType::Local))?;

        let mut branch_names = Vec::new();
        for branch in branches {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                branch_names.push(name.to_string());
            }
        }

        Ok(branch_names)
    }

    /// Get a signature for commits
    fn get_signature(&self) -> Result<Signature<'static>> {
        if let Ok(config) = self.repo.config() {
            if let (Ok(name), Ok(email)) = (
                config.get_string("user.name"),
                config.get_string("user.email"),
            ) {
                return Ok(Signature::now(&name, &email)?);
            }
        }

        Ok(Signature::now("patchstack", "patchstack@localhost")?)
    }

    fn branch_tip(&self, branch: &str) -> Result<Oid> {
        let branch_ref = self
            .repo
            .find_branch(branch, git2::BranchType::Local)
            .map_err(|e| {
                PatchStackError::validation(format!("Could not find branch '{branch}': {e}"))
            })?;
        let commit = branch_ref.get().peel_to_commit()?;
        Ok(commit.id())
    }

    fn is_ancestor_or_equal(&self, tip: Oid, commit: Oid) -> Result<bool> {
        if tip == commit {
            return Ok(true);
        }
        Ok(self.repo.graph_descendant_of(tip, commit)?)
    }
}

impl VersionControl for GitRepository {
    fn workdir(&self) -> &Path {
        &self.path
    }

    fn is_dirty(&self) -> Result<bool> {
        let mut options = git2::StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;

        let dirty = statuses.iter().any(|status| {
            status.status().intersects(
                git2::Status::INDEX_NEW
                    | git2::Status::INDEX_MODIFIED
                    | git2::Status::INDEX_DELETED
                    | git2::Status::INDEX_RENAMED
                    | git2::Status::INDEX_TYPECHANGE
                    | git2::Status::WT_MODIFIED
                    | git2::Status::WT_DELETED
                    | git2::Status::WT_RENAMED
                    | git2::Status::WT_TYPECHANGE
                    | git2::Status::CONFLICTED,
            )
        });

        Ok(dirty)
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let head = self
            .repo
            .head()
            .map_err(|e| PatchStackError::validation(format!("Could not get HEAD: {e}")))?;

        if head.is_branch() {
            Ok(head.shorthand().map(str::to_string))
        } else {
            Ok(None)
        }
    }

    fn head_commit(&self) -> Result<String> {
        Ok(self.get_head_commit()?.id().to_string())
    }

    fn find_tag(&self, name: &str) -> Result<Option<String>> {
        match self.repo.find_reference(&format!("refs/tags/{name}")) {
            Ok(reference) => {
                let commit = reference.peel_to_commit()?;
                Ok(Some(commit.id().to_string()))
            }
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(PatchStackError::Git(e)),
        }
    }

    fn create_tag(&self, name: &str, target: &str) -> Result<()> {
        let commit = self.resolve_commit(target)?;
        self.repo
            .tag_lightweight(name, commit.as_object(), false)
            .map_err(|e| PatchStackError::validation(format!("Could not create tag '{name}': {e}")))?;
        tracing::debug!("Created tag '{}' at {}", name, commit.id());
        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        self.repo
            .tag_delete(name)
            .map_err(|e| PatchStackError::validation(format!("Could not delete tag '{name}': {e}")))?;
        tracing::debug!("Deleted tag '{}'", name);
        Ok(())
    }

    fn branch_contains(&self, branch: &str, commit: &str) -> Result<bool> {
        let tip = self.branch_tip(branch)?;
        let commit = self.resolve_commit(commit)?.id();
        self.is_ancestor_or_equal(tip, commit)
    }

    fn branches_containing(&self, commit: &str) -> Result<Vec<String>> {
        let commit = self.resolve_commit(commit)?.id();
        let mut containing = Vec::new();
        for branch in self.list_branches()? {
            if self.is_ancestor_or_equal(self.branch_tip(&branch)?, commit)? {
                containing.push(branch);
            }
        }
        Ok(containing)
    }

    fn commits_since(&self, base: &str) -> Result<Vec<CommitInfo>> {
        let base = self.resolve_commit(base)?.id();

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.hide(base)?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            commits.push(CommitInfo {
                id: commit.id().to_string(),
                summary: commit.summary().unwrap_or_default().to_string(),
                message: commit.message().unwrap_or_default().to_string(),
            });
        }

        Ok(commits)
    }

    fn apply_patch(
        &self,
        patch: &Path,
        tool: ApplyTool,
        three_way: bool,
        context_lines: u32,
    ) -> Result<ApplyOutcome> {
        let context = format!("-C{context_lines}");
        let mut args: Vec<&OsStr> = vec![OsStr::new(tool.command_name())];
        args.extend(tool.mode_flags().iter().map(OsStr::new));
        args.push(OsStr::new(&context));
        args.push(patch.as_os_str());
        if three_way {
            args.push(OsStr::new("--3way"));
        }

        let output = run_git(&self.path, &args)?;
        if output.success {
            Ok(ApplyOutcome::Applied)
        } else {
            Ok(ApplyOutcome::Rejected {
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    fn abort_mailbox(&self) -> Result<()> {
        run_git(&self.path, ["am", "--abort"])?.checked("git am --abort")?;
        Ok(())
    }

    fn untracked_files(&self) -> Result<Vec<PathBuf>> {
        let mut options = git2::StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;

        Ok(statuses
            .iter()
            .filter(|status| status.status().contains(git2::Status::WT_NEW))
            .filter_map(|status| status.path().map(PathBuf::from))
            .collect())
    }

    fn stage_changes(&self, preexisting: &[PathBuf]) -> Result<()> {
        let created: Vec<PathBuf> = self
            .untracked_files()?
            .into_iter()
            .filter(|path| !preexisting.contains(path))
            .collect();

        let mut index = self.repo.index()?;
        index.read(true)?;
        index.update_all(["*"].iter(), None)?;
        for path in &created {
            index.add_path(path)?;
        }
        index.write()?;

        tracing::debug!("Staged tracked changes and {} new file(s)", created.len());
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        let signature = self.get_signature()?;
        let mut index = self.repo.index()?;
        index.read(true)?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let parent_commit = self.get_head_commit()?;

        let commit_id = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&parent_commit],
        )?;

        tracing::debug!("Created commit: {}", commit_id);
        Ok(commit_id.to_string())
    }

    fn head_message(&self) -> Result<String> {
        let head = self.get_head_commit()?;
        Ok(head.message().unwrap_or_default().to_string())
    }

    fn amend_head_message(&self, message: &str) -> Result<String> {
        let head = self.get_head_commit()?;
        let amended = head.amend(Some("HEAD"), None, None, None, Some(message), None)?;
        tracing::debug!("Amended {} -> {}", head.id(), amended);
        Ok(amended.to_string())
    }

    fn format_patch(&self, commit: &str) -> Result<String> {
        let output = run_git(
            &self.path,
            ["format-patch", "-1", "-N", "--stdout", commit],
        )?
        .checked(&format!("git format-patch -1 -N --stdout {commit}"))?;
        Ok(output.stdout)
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        match self.repo.find_branch(name, git2::BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(PatchStackError::Git(e)),
        }
    }

    fn create_branch(&self, name: &str, target: &str) -> Result<()> {
        let target_commit = self.resolve_commit(target)?;
        self.repo.branch(name, &target_commit, false).map_err(|e| {
            PatchStackError::validation(format!("Could not create branch '{name}': {e}"))
        })?;

        tracing::debug!("Created branch '{}'", name);
        Ok(())
    }

    fn reset_hard(&self, target: &str) -> Result<()> {
        let target_commit = self.resolve_commit(target)?;
        self.repo
            .reset(target_commit.as_object(), git2::ResetType::Hard, None)?;

        tracing::debug!("Hard reset to {}", target);
        Ok(())
    }

    fn run_script(&self, script: &Path) -> Result<ScriptOutcome> {
        super::run_script_in(&self.path, script)
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        super::write_file_in(path, contents)
    }
}
