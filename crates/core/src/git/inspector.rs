//! Read-only queries against the working tree.
//!
//! Nothing is cached: every call re-runs git (or re-probes the filesystem),
//! so answers always reflect what the operator or a previous command just
//! did to the repository.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::parser::{parse_branch_list, parse_conflicted_paths, porcelain_is_dirty};
use crate::command::CommandRunner;
use crate::errors::CommandError;
use crate::models::{ConflictedFile, OperationInProgress, RepositoryContext};

/// Present while git waits for a merge to be committed.
pub const MERGE_MARKER: &str = "MERGE_HEAD";
/// Present while a merge-backend rebase is stopped.
pub const REBASE_MERGE_MARKER: &str = "rebase-merge";
/// Present while an apply-backend rebase (including `git svn rebase`) is stopped.
pub const REBASE_APPLY_MARKER: &str = "rebase-apply";

/// Top-level directory of the working tree containing `path`.
///
/// Conflicted paths are reported relative to this directory, so every
/// command that takes them must run from here. Falls back to `path` when git
/// cannot tell (for example outside any repository).
pub fn work_tree_root(runner: &dyn CommandRunner, path: &Path) -> Result<PathBuf, CommandError> {
    let out = runner.run("git", &["rev-parse", "--show-toplevel"], false)?;
    let root = out.stdout.trim();
    if out.success() && !root.is_empty() {
        Ok(PathBuf::from(root))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Queries repository state through git and marker-file probes.
pub struct RepositoryInspector<'a> {
    runner: &'a dyn CommandRunner,
    git_dir: PathBuf,
}

impl<'a> RepositoryInspector<'a> {
    /// Build an inspector for a known git directory.
    pub fn new(runner: &'a dyn CommandRunner, git_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            git_dir: git_dir.into(),
        }
    }

    /// Build an inspector for the working tree at `work_dir`, asking git where
    /// its metadata lives so linked worktrees resolve correctly.
    pub fn discover(runner: &'a dyn CommandRunner, work_dir: &Path) -> Result<Self, CommandError> {
        let out = runner.run("git", &["rev-parse", "--absolute-git-dir"], false)?;
        let git_dir = if out.success() && !out.stdout.trim().is_empty() {
            PathBuf::from(out.stdout.trim())
        } else {
            work_dir.join(".git")
        };
        debug!(git_dir = %git_dir.display(), "resolved git directory");
        Ok(Self::new(runner, git_dir))
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn is_inside_working_tree(&self) -> Result<bool, CommandError> {
        let out = self
            .runner
            .run("git", &["rev-parse", "--is-inside-work-tree"], false)?;
        Ok(out.success() && out.stdout.trim() == "true")
    }

    /// The checked-out branch, or `None` when HEAD is detached or git fails.
    pub fn current_branch(&self) -> Result<Option<String>, CommandError> {
        let out = self.runner.run("git", &["branch", "--show-current"], false)?;
        let name = out.stdout.trim();
        if out.success() && !name.is_empty() {
            Ok(Some(name.to_string()))
        } else {
            Ok(None)
        }
    }

    /// Whether `git status --porcelain` reports anything, untracked files
    /// included.
    #[instrument(skip(self))]
    pub fn has_uncommitted_changes(&self) -> Result<bool, CommandError> {
        let out = self.runner.run("git", &["status", "--porcelain"], true)?;
        Ok(porcelain_is_dirty(&out.stdout))
    }

    pub fn list_local_branches(&self) -> Result<Vec<String>, CommandError> {
        let out = self.runner.run("git", &["branch"], false)?;
        if !out.success() {
            return Ok(Vec::new());
        }
        Ok(parse_branch_list(&out.stdout))
    }

    /// Files git currently reports as unmerged.
    pub fn conflicted_files(&self) -> Result<Vec<ConflictedFile>, CommandError> {
        let out = self.runner.run(
            "git",
            &["diff", "--name-only", "--diff-filter=U", "-z"],
            false,
        )?;
        if !out.success() {
            return Ok(Vec::new());
        }
        let files = parse_conflicted_paths(&out.stdout);
        debug!(count = files.len(), "queried conflicted files");
        Ok(files)
    }

    pub fn merge_in_progress(&self) -> bool {
        self.git_dir.join(MERGE_MARKER).exists()
    }

    pub fn rebase_in_progress(&self) -> bool {
        self.git_dir.join(REBASE_MERGE_MARKER).exists()
            || self.git_dir.join(REBASE_APPLY_MARKER).exists()
    }

    /// The paused operation, judged from marker files alone.
    pub fn operation_in_progress(&self) -> Option<OperationInProgress> {
        OperationInProgress::from_markers(self.merge_in_progress(), self.rebase_in_progress())
    }

    /// Fresh snapshot of the whole repository state.
    pub fn context(&self) -> Result<RepositoryContext, CommandError> {
        Ok(RepositoryContext {
            current_branch: self.current_branch()?,
            branches: self.list_local_branches()?,
            merge_in_progress: self.merge_in_progress(),
            rebase_in_progress: self.rebase_in_progress(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRepo, Outcome};

    #[test]
    fn test_markers_are_filesystem_probes() {
        let repo = FakeRepo::new();
        let inspector = RepositoryInspector::new(&repo, repo.git_dir());
        assert!(!inspector.merge_in_progress());
        assert!(!inspector.rebase_in_progress());

        std::fs::write(repo.git_dir().join(MERGE_MARKER), "abc\n").unwrap();
        assert!(inspector.merge_in_progress());

        std::fs::create_dir(repo.git_dir().join(REBASE_APPLY_MARKER)).unwrap();
        assert!(inspector.rebase_in_progress());
        assert!(repo.commands().is_empty(), "marker probes must not run git");
    }

    #[test]
    fn test_operation_in_progress_follows_markers() {
        let repo = FakeRepo::new();
        let inspector = RepositoryInspector::new(&repo, repo.git_dir());
        assert_eq!(inspector.operation_in_progress(), None);

        std::fs::write(repo.git_dir().join(MERGE_MARKER), "abc\n").unwrap();
        assert_eq!(inspector.operation_in_progress(), Some(OperationInProgress::Merge));

        std::fs::create_dir(repo.git_dir().join(REBASE_MERGE_MARKER)).unwrap();
        assert_eq!(inspector.operation_in_progress(), Some(OperationInProgress::Rebase));
        assert!(repo.commands().is_empty());
    }

    #[test]
    fn test_conflicted_files_reflect_current_state() {
        let repo = FakeRepo::new();
        repo.set_conflicts(&["a.txt", "b.txt"]);
        let inspector = RepositoryInspector::new(&repo, repo.git_dir());
        assert_eq!(inspector.conflicted_files().unwrap().len(), 2);

        repo.set_conflicts(&[]);
        assert!(inspector.conflicted_files().unwrap().is_empty());
    }

    #[test]
    fn test_context_snapshot() {
        let repo = FakeRepo::new();
        repo.set_branches("master", &["feature-x", "master"]);
        let inspector = RepositoryInspector::new(&repo, repo.git_dir());
        let ctx = inspector.context().unwrap();
        assert_eq!(ctx.current_branch.as_deref(), Some("master"));
        assert_eq!(ctx.branches, vec!["feature-x", "master"]);
        assert!(!ctx.merge_in_progress);
    }

    #[test]
    fn test_dirty_tree_detected() {
        let repo = FakeRepo::new();
        let inspector = RepositoryInspector::new(&repo, repo.git_dir());
        assert!(!inspector.has_uncommitted_changes().unwrap());
        repo.set_dirty(true);
        assert!(inspector.has_uncommitted_changes().unwrap());
    }

    #[test]
    fn test_work_tree_root_comes_from_git() {
        let repo = FakeRepo::new();
        let root = work_tree_root(&repo, Path::new("/somewhere/sub")).unwrap();
        assert_eq!(root, repo.git_dir());
    }

    #[test]
    fn test_work_tree_root_falls_back_outside_a_repository() {
        let repo = FakeRepo::new();
        repo.script(
            "rev-parse --show-toplevel",
            Outcome::fail("", "fatal: not a git repository"),
        );
        let root = work_tree_root(&repo, Path::new("/not/a/repo")).unwrap();
        assert_eq!(root, Path::new("/not/a/repo"));
    }
}
