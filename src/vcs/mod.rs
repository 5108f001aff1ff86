//! Version-control collaborator.
//!
//! The workflow never talks to git directly; it programs against [`Vcs`].
//! [`GitCli`] is the production implementation and shells out to the `git`
//! executable. Every method is blocking and operates on an open
//! [`RepoHandle`].

pub mod git_cli;

pub use git_cli::GitCli;

use crate::Result;
use std::path::{Path, PathBuf};

/// Reference to one open repository.
///
/// Only a [`Vcs`] implementation can create one, and closing consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct RepoHandle {
    root: PathBuf,
}

impl RepoHandle {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Working tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Author and committer identity applied to every commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl CommitIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Version-control primitives the workflow is built from.
///
/// Failures come back as [`crate::Error`]; a failed merge or rebase keeps the
/// engine's message so that callers can tell a conflict from other failures.
pub trait Vcs {
    /// Open the repository whose working tree root is `path`.
    ///
    /// Fails with `RepositoryNotFound` when `path` hosts no repository.
    fn open(&self, path: &Path) -> Result<RepoHandle>;

    /// Create an empty repository at `path` whose unborn HEAD points at `initial_branch`.
    fn init(&self, path: &Path, initial_branch: &str) -> Result<RepoHandle>;

    /// Release any resources held for `repo`.
    fn close(&self, repo: RepoHandle) {
        drop(repo);
    }

    /// False while HEAD is unborn (no commit yet).
    fn has_commits(&self, repo: &RepoHandle) -> Result<bool>;

    /// Local branch names.
    fn list_branches(&self, repo: &RepoHandle) -> Result<Vec<String>>;

    /// Name of the checked-out branch.
    fn current_branch(&self, repo: &RepoHandle) -> Result<String>;

    /// Create `name` at the current commit without switching to it.
    fn create_branch(&self, repo: &RepoHandle, name: &str) -> Result<()>;

    fn checkout(&self, repo: &RepoHandle, name: &str) -> Result<()>;

    /// True when tracked files differ from HEAD (worktree or index).
    fn is_dirty(&self, repo: &RepoHandle) -> Result<bool>;

    /// Untracked, non-ignored paths.
    fn untracked(&self, repo: &RepoHandle) -> Result<Vec<String>>;

    /// Stage the given paths.
    fn stage(&self, repo: &RepoHandle, paths: &[&str]) -> Result<()>;

    /// Stage every change, including untracked and deleted files.
    fn stage_all(&self, repo: &RepoHandle) -> Result<()>;

    /// Commit the index and return the new commit id.
    fn commit(&self, repo: &RepoHandle, message: &str) -> Result<String>;

    /// Merge `branch` into the checked-out branch.
    fn merge(&self, repo: &RepoHandle, branch: &str) -> Result<()>;

    /// Stage the combined changes of `branch` without committing.
    fn merge_squash(&self, repo: &RepoHandle, branch: &str) -> Result<()>;

    /// Fast-forward the checked-out branch to `branch`; fails if that is impossible.
    fn merge_fast_forward(&self, repo: &RepoHandle, branch: &str) -> Result<()>;

    /// Rebase the checked-out branch onto `onto`.
    fn rebase(&self, repo: &RepoHandle, onto: &str) -> Result<()>;

    /// Human-readable status text.
    fn status(&self, repo: &RepoHandle) -> Result<String>;

    /// Paths with unresolved conflicts.
    fn unmerged_paths(&self, repo: &RepoHandle) -> Result<Vec<String>>;

    /// URL of remote `name`, or `None` if no such remote exists.
    fn remote_url(&self, repo: &RepoHandle, name: &str) -> Result<Option<String>>;

    /// Create remote `name` or point it at `url`.
    fn remote_set(&self, repo: &RepoHandle, name: &str, url: &str) -> Result<()>;

    /// Fetch from remote `name` to confirm it is reachable.
    fn remote_update(&self, repo: &RepoHandle, name: &str) -> Result<()>;

    fn push(&self, repo: &RepoHandle, remote: &str, branch: &str) -> Result<()>;
}
