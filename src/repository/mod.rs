//! Repository lifecycle: connect, initialize, close, and the branch workflow.
//!
//! [`RepositoryLifecycle`] is either Disconnected (no handle) or Connected
//! (one open [`RepoHandle`]). Only [`RepositoryLifecycle::initialize`] moves
//! it to Connected and only [`RepositoryLifecycle::close`] moves it back;
//! every other operation returns [`Error::NotConnected`] while Disconnected.

pub mod merge;

pub use merge::{MergeConflictResolver, MergeOutcome, is_conflict_message};

use crate::config::MergeSettings;
use crate::telemetry::Logger;
use crate::vcs::{GitCli, RepoHandle, Vcs};
use crate::{Error, Result};
use serde::Serialize;
use std::path::Path;

/// Placeholder file committed when a repository is created.
pub const BOOTSTRAP_FILE: &str = "README.md";

/// Content of [`BOOTSTRAP_FILE`] when it does not already exist.
pub const BOOTSTRAP_CONTENT: &str = "# Initial commit\n";

/// Message of the bootstrap commit.
pub const BOOTSTRAP_MESSAGE: &str = "Initial commit";

/// How [`RepositoryLifecycle::initialize`] connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum InitOutcome {
    /// An existing repository was opened
    Opened,
    /// A repository was created and given a bootstrap commit
    Created { commit: String },
}

/// What [`RepositoryLifecycle::add_remote`] changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "lowercase")]
pub enum RemoteChange {
    Added,
    Updated { previous: String },
    Unchanged,
}

/// Owns at most one open repository and the workflow operations on it.
pub struct RepositoryLifecycle<V: Vcs = GitCli> {
    vcs: V,
    handle: Option<RepoHandle>,
    initial_branch: String,
    merge_settings: MergeSettings,
    logger: Logger,
}

impl<V: Vcs> RepositoryLifecycle<V> {
    /// A Disconnected lifecycle.
    pub fn new(vcs: V, logger: Logger) -> Self {
        Self {
            vcs,
            handle: None,
            initial_branch: "main".to_string(),
            merge_settings: MergeSettings {
                strategy: Default::default(),
                squash: false,
            },
            logger,
        }
    }

    /// Branch that newly created repositories start on (default `main`).
    pub fn with_initial_branch(mut self, name: impl Into<String>) -> Self {
        self.initial_branch = name.into();
        self
    }

    pub fn with_merge_settings(mut self, settings: MergeSettings) -> Self {
        self.merge_settings = settings;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Working tree root of the open repository.
    pub fn root(&self) -> Option<&Path> {
        self.handle.as_ref().map(RepoHandle::root)
    }

    fn repo(&self) -> Result<&RepoHandle> {
        self.handle.as_ref().ok_or(Error::NotConnected)
    }

    /// Open the repository at `path`, creating it (with a bootstrap commit) if needed.
    ///
    /// A path that does not exist fails with `RepositoryNotFound` and leaves
    /// the lifecycle Disconnected.
    pub fn initialize(&mut self, path: &Path) -> Result<InitOutcome> {
        self.close();
        let _log = self.logger.enter();
        tracing::info!(path = %path.display(), "initializing repository");

        if !path.is_dir() {
            tracing::error!(path = %path.display(), "path does not exist, failing initialization");
            return Err(Error::RepositoryNotFound(path.to_path_buf()));
        }

        match self.vcs.open(path) {
            Ok(handle) => {
                if self.vcs.has_commits(&handle)? {
                    tracing::info!(path = %path.display(), "connected to existing repository");
                    self.handle = Some(handle);
                    return Ok(InitOutcome::Opened);
                }
                // An earlier initialization created the repository but never committed.
                let commit = self.bootstrap_commit(&handle)?;
                tracing::info!(
                    path = %path.display(),
                    commit = %commit,
                    "bootstrapped existing repository with no commits"
                );
                self.handle = Some(handle);
                Ok(InitOutcome::Created { commit })
            }
            Err(Error::RepositoryNotFound(_)) => {
                let handle = self.vcs.init(path, &self.initial_branch)?;
                let commit = self.bootstrap_commit(&handle)?;
                tracing::info!(
                    path = %path.display(),
                    branch = %self.initial_branch,
                    commit = %commit,
                    "created repository with bootstrap commit"
                );
                self.handle = Some(handle);
                Ok(InitOutcome::Created { commit })
            }
            Err(e) => Err(e),
        }
    }

    fn bootstrap_commit(&self, handle: &RepoHandle) -> Result<String> {
        let placeholder = handle.root().join(BOOTSTRAP_FILE);
        if !placeholder.exists() {
            std::fs::write(&placeholder, BOOTSTRAP_CONTENT)?;
        }
        self.vcs.stage(handle, &[BOOTSTRAP_FILE])?;
        self.vcs.commit(handle, BOOTSTRAP_MESSAGE)
    }

    /// Release the open repository. Does nothing while Disconnected.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _log = self.logger.enter();
            tracing::info!(path = %handle.root().display(), "repository closed");
            self.vcs.close(handle);
        }
    }

    /// Live list of local branches.
    pub fn list_branches(&self) -> Result<Vec<String>> {
        let repo = self.repo()?;
        self.vcs.list_branches(repo)
    }

    pub fn current_branch(&self) -> Result<String> {
        let repo = self.repo()?;
        self.vcs.current_branch(repo)
    }

    /// Create `name` at the current commit and switch to it.
    pub fn create_branch(&self, name: &str) -> Result<()> {
        let repo = self.repo()?;
        let _log = self.logger.enter();

        if self.vcs.list_branches(repo)?.iter().any(|b| b == name) {
            tracing::error!(branch = name, "branch already exists");
            return Err(Error::BranchExists(name.to_string()));
        }
        self.vcs.create_branch(repo, name)?;
        self.vcs.checkout(repo, name)?;
        tracing::info!(branch = name, "created and switched to new branch");
        Ok(())
    }

    /// Switch to an existing branch.
    pub fn switch_branch(&self, name: &str) -> Result<()> {
        let repo = self.repo()?;
        let _log = self.logger.enter();

        if !self.vcs.list_branches(repo)?.iter().any(|b| b == name) {
            tracing::error!(branch = name, "branch does not exist");
            return Err(Error::BranchNotFound(name.to_string()));
        }
        self.vcs.checkout(repo, name)?;
        tracing::info!(branch = name, "switched branch");
        Ok(())
    }

    /// Stage everything (including untracked files) and commit.
    ///
    /// Returns the new commit id, or `NothingToCommit` on a clean tree.
    pub fn commit_changes(&self, message: &str) -> Result<String> {
        let repo = self.repo()?;
        let _log = self.logger.enter();

        let dirty = self.vcs.is_dirty(repo)?;
        let untracked = self.vcs.untracked(repo)?;
        tracing::debug!(dirty, untracked = untracked.len(), "working tree state");

        if !dirty && untracked.is_empty() {
            tracing::warn!("no changes to commit");
            return Err(Error::NothingToCommit);
        }

        self.vcs.stage_all(repo)?;
        let commit = self.vcs.commit(repo, message)?;
        tracing::info!(commit = %commit, "changes committed");
        Ok(commit)
    }

    /// URL of remote `name`, if configured in the repository.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>> {
        let repo = self.repo()?;
        self.vcs.remote_url(repo, name)
    }

    /// Create or repoint remote `name`, then fetch from it to confirm it is reachable.
    pub fn add_remote(&self, name: &str, url: &str) -> Result<RemoteChange> {
        let repo = self.repo()?;
        let _log = self.logger.enter();
        let remote_err =
            |e: Error| Error::RemoteOperationFailed(format!("remote '{}': {}", name, e));

        let change = match self.vcs.remote_url(repo, name).map_err(remote_err)? {
            None => {
                self.vcs.remote_set(repo, name, url).map_err(remote_err)?;
                tracing::info!(remote = name, url, "added new remote");
                RemoteChange::Added
            }
            Some(previous) if previous != url => {
                self.vcs.remote_set(repo, name, url).map_err(remote_err)?;
                tracing::info!(remote = name, from = %previous, to = url, "updated remote URL");
                RemoteChange::Updated { previous }
            }
            Some(_) => {
                tracing::info!(remote = name, "remote already exists with the correct URL");
                RemoteChange::Unchanged
            }
        };

        self.vcs.remote_update(repo, name).map_err(|e| {
            tracing::error!(remote = name, error = %e, "remote verification failed");
            Error::RemoteOperationFailed(format!("remote '{}' is not reachable: {}", name, e))
        })?;
        tracing::info!(remote = name, "verified remote");
        Ok(change)
    }

    /// Push `branch` (or the current branch) to `remote`. Never retried.
    ///
    /// Returns the name of the pushed branch.
    pub fn push_changes(&self, remote: &str, branch: Option<&str>) -> Result<String> {
        let repo = self.repo()?;
        let _log = self.logger.enter();

        let branch = match branch {
            Some(b) => b.to_string(),
            None => self.vcs.current_branch(repo)?,
        };
        self.vcs.push(repo, remote, &branch).map_err(|e| {
            tracing::error!(remote, branch = %branch, error = %e, "push failed");
            Error::PushFailed(e.to_string())
        })?;
        tracing::info!(remote, branch = %branch, "pushed changes");
        Ok(branch)
    }

    /// Merge `feature` into `main_branch`.
    pub fn merge_branch(&self, feature: &str, main_branch: &str) -> Result<MergeOutcome> {
        let repo = self.repo()?;
        let _log = self.logger.enter();
        tracing::info!(
            feature,
            main = main_branch,
            strategy = %self.merge_settings.strategy,
            squash = self.merge_settings.squash,
            "merging branch"
        );

        let outcome = MergeConflictResolver::new(&self.vcs, repo, self.merge_settings)
            .merge_branch(feature, main_branch);
        match &outcome {
            MergeOutcome::Clean => tracing::info!(feature, main = main_branch, "merged"),
            MergeOutcome::Conflict { paths } => {
                tracing::warn!(?paths, "merge conflict detected, resolve manually")
            }
            MergeOutcome::Failed { reason } => tracing::error!(%reason, "merge failed"),
        }
        Ok(outcome)
    }

    /// Re-check the working tree for unresolved conflicts.
    pub fn resolve_conflicts(&self) -> Result<MergeOutcome> {
        let repo = self.repo()?;
        let _log = self.logger.enter();

        let outcome =
            MergeConflictResolver::new(&self.vcs, repo, self.merge_settings).check_conflict_state();
        tracing::info!(outcome = %outcome, "checked conflict state");
        Ok(outcome)
    }
}

impl<V: Vcs> Drop for RepositoryLifecycle<V> {
    fn drop(&mut self) {
        self.close();
    }
}
