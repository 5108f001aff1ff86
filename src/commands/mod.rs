//! Command implementations for the `fbt` CLI.
//!
//! Each function maps one subcommand onto exactly one lifecycle or resolver
//! call and returns a result that knows how to print itself:
//! - `init` - bootstrap the config and connect the repository
//! - `create-branch` / `switch-branch` - branch workflow
//! - `commit` / `push` - record and publish changes
//! - `merge` / `resolve-conflicts` - merge state machine

pub mod remote;

pub use remote::{
    FixedRemoteUrl, REMOTE_URL_ENV, RemoteUrlResolver, StdinRemoteUrl, default_resolver,
};

use crate::config::{ConfigStore, WorkflowConfig};
use crate::repository::{InitOutcome, MergeOutcome, RemoteChange, RepositoryLifecycle};
use crate::telemetry::Logger;
use crate::vcs::{CommitIdentity, GitCli, Vcs};
use crate::{Error, Result};
use serde::Serialize;
use std::path::Path;

const MERGE_CONFLICT_HINT: &str =
    "Merge conflict detected. Please resolve conflicts manually and then commit the changes.";
const UNRESOLVED_CONFLICT_HINT: &str =
    "Conflicts detected. Please resolve them manually, stage the changes, and then commit.";

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

fn git_for(settings: &WorkflowConfig) -> GitCli {
    GitCli::new().with_identity(CommitIdentity::new(
        settings.commit.author_name.clone(),
        settings.commit.author_email.clone(),
    ))
}

// === Init ===

#[derive(Debug, Serialize)]
pub struct InitResult {
    pub repo_path: String,
    pub config_path: String,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub remote: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_change: Option<RemoteChange>,
    /// Set when a declared remote could not be registered; init still succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

impl Output for InitResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Successfully initialized repository at {}",
            self.repo_path
        )];
        if let Some(commit) = &self.commit {
            lines.push(format!("  Created bootstrap commit {}", short(commit)));
        }
        match (&self.remote_url, &self.remote_change) {
            (Some(url), Some(RemoteChange::Added)) => {
                lines.push(format!("Added remote '{}' with URL: {}", self.remote, url))
            }
            (Some(url), Some(RemoteChange::Updated { previous })) => lines.push(format!(
                "Updated remote '{}' URL from {} to {}",
                self.remote, previous, url
            )),
            (Some(url), _) => {
                lines.push(format!("Using remote '{}' with URL: {}", self.remote, url))
            }
            (None, _) => {}
        }
        if let Some(err) = &self.remote_error {
            lines.push(format!("Failed to add remote repository: {}", err));
        }
        lines.push(format!("Updated configuration file at {}", self.config_path));
        lines.join("\n")
    }
}

/// Connect (or create) the repository at `repo_path` and record it in the config.
///
/// A declared `remote_url` is registered under `repository.remote`; without
/// one, an existing remote of that name is discovered and recorded instead.
pub fn init(
    store: &mut ConfigStore,
    repo_path: &Path,
    remote_url: Option<&str>,
    logger: Logger,
) -> Result<InitResult> {
    let settings = store.settings()?;
    let _log = logger.enter();

    if !repo_path.is_dir() {
        tracing::error!(path = %repo_path.display(), "repository path does not exist");
        return Err(Error::RepositoryNotFound(repo_path.to_path_buf()));
    }
    let repo_path = repo_path.canonicalize()?;

    let mut lifecycle = RepositoryLifecycle::new(git_for(&settings), logger.clone())
        .with_initial_branch(settings.branches.main.clone())
        .with_merge_settings(settings.merge);
    let outcome = lifecycle.initialize(&repo_path)?;

    let repo_path_str = repo_path.to_string_lossy().to_string();
    store.set("repository.path", repo_path_str.clone())?;

    let remote = settings.repository.remote.clone();
    let mut remote_change = None;
    let mut remote_error = None;
    let mut wired_url = None;

    match remote_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => match lifecycle.add_remote(&remote, url) {
            Ok(change) => {
                store.set("repository.remote_url", url)?;
                remote_change = Some(change);
                wired_url = Some(url.to_string());
            }
            Err(e) => {
                tracing::warn!(remote = %remote, error = %e, "could not register declared remote");
                remote_error = Some(e.to_string());
            }
        },
        None => {
            if let Some(url) = lifecycle.remote_url(&remote)? {
                tracing::info!(remote = %remote, url = %url, "discovered existing remote");
                store.set("repository.remote_url", url.clone())?;
                wired_url = Some(url);
            }
        }
    }

    lifecycle.close();

    let commit = match outcome {
        InitOutcome::Created { commit } => Some(commit),
        InitOutcome::Opened => None,
    };
    Ok(InitResult {
        repo_path: repo_path_str,
        config_path: store.path().display().to_string(),
        created: commit.is_some(),
        commit,
        remote,
        remote_url: wired_url,
        remote_change,
        remote_error,
    })
}

// === Branches ===

#[derive(Debug, Serialize)]
pub struct BranchResult {
    pub branch: String,
    pub created: bool,
}

impl Output for BranchResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.created {
            format!("Successfully created and switched to new branch: {}", self.branch)
        } else {
            format!("Successfully switched to branch: {}", self.branch)
        }
    }
}

// === Commit ===

#[derive(Debug, Serialize)]
pub struct CommitResult {
    pub commit: String,
    pub branch: String,
    pub message: String,
}

impl Output for CommitResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Successfully committed changes with message: {}\n  {} on {}",
            self.message,
            short(&self.commit),
            self.branch
        )
    }
}

// === Push ===

#[derive(Debug, Serialize)]
pub struct PushResult {
    pub remote: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    /// The remote was registered during this push.
    pub remote_registered: bool,
}

impl Output for PushResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        if self.remote_registered {
            if let Some(url) = &self.remote_url {
                lines.push(format!("Added remote '{}' with URL: {}", self.remote, url));
            }
        }
        lines.push(format!(
            "Successfully pushed '{}' to remote '{}'",
            self.branch, self.remote
        ));
        lines.join("\n")
    }
}

// === Merge ===

#[derive(Debug, Serialize)]
pub struct MergeResult {
    pub feature: String,
    pub main_branch: String,
    #[serde(flatten)]
    pub outcome: MergeOutcome,
}

impl Output for MergeResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match &self.outcome {
            MergeOutcome::Clean => format!(
                "Successfully merged '{}' into '{}'",
                self.feature, self.main_branch
            ),
            MergeOutcome::Conflict { paths } => {
                let mut lines = vec![MERGE_CONFLICT_HINT.to_string()];
                lines.extend(paths.iter().map(|p| format!("  both modified: {}", p)));
                lines.push(
                    "After resolving conflicts, run the 'resolve-conflicts' command.".to_string(),
                );
                lines.join("\n")
            }
            MergeOutcome::Failed { reason } => format!(
                "Failed to merge '{}' into '{}': {}",
                self.feature, self.main_branch, reason
            ),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConflictCheckResult {
    #[serde(flatten)]
    pub outcome: MergeOutcome,
}

impl Output for ConflictCheckResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match &self.outcome {
            MergeOutcome::Conflict { paths } => {
                let mut lines = vec![UNRESOLVED_CONFLICT_HINT.to_string()];
                lines.extend(paths.iter().map(|p| format!("  unmerged: {}", p)));
                lines.push("Use the following commands:".to_string());
                lines.push("1. Edit the conflicting files to resolve conflicts".to_string());
                lines.push("2. Stage the resolved files: git add <filename>".to_string());
                lines.push(
                    "3. Commit the changes: fbt commit \"Resolve merge conflicts\"".to_string(),
                );
                lines.join("\n")
            }
            MergeOutcome::Clean => "No conflicts detected.".to_string(),
            MergeOutcome::Failed { reason } => format!("Failed to check for conflicts: {}", reason),
        }
    }
}

fn short(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}

// === Workflow ===

/// A connected repository plus the configuration that drives it.
///
/// Construction fails with `NotInitialized` until `fbt init` has stored a
/// repository path. The repository is closed when the workflow is dropped.
pub struct Workflow<V: Vcs = GitCli> {
    store: ConfigStore,
    settings: WorkflowConfig,
    lifecycle: RepositoryLifecycle<V>,
    logger: Logger,
}

impl Workflow<GitCli> {
    /// Connect to the configured repository using the `git` executable.
    pub fn open(store: ConfigStore, logger: Logger) -> Result<Self> {
        let settings = store.settings()?;
        Self::with_vcs(store, git_for(&settings), logger)
    }
}

impl<V: Vcs> Workflow<V> {
    pub fn with_vcs(store: ConfigStore, vcs: V, logger: Logger) -> Result<Self> {
        let settings = store.settings()?;
        let repo_path = settings.repository.path.trim();
        if repo_path.is_empty() {
            return Err(Error::NotInitialized);
        }

        let mut lifecycle = RepositoryLifecycle::new(vcs, logger.clone())
            .with_initial_branch(settings.branches.main.clone())
            .with_merge_settings(settings.merge);
        lifecycle.initialize(Path::new(repo_path))?;

        Ok(Self {
            store,
            settings,
            lifecycle,
            logger,
        })
    }

    pub fn settings(&self) -> &WorkflowConfig {
        &self.settings
    }

    pub fn lifecycle(&self) -> &RepositoryLifecycle<V> {
        &self.lifecycle
    }

    /// Create and switch to `name`, prefixed with `branches.prefix` when `feature` is set.
    pub fn create_branch(&self, name: &str, feature: bool) -> Result<BranchResult> {
        let branch = if feature {
            self.settings.branches.feature_name(name)
        } else {
            name.to_string()
        };
        self.lifecycle.create_branch(&branch)?;
        Ok(BranchResult {
            branch,
            created: true,
        })
    }

    pub fn switch_branch(&self, name: &str) -> Result<BranchResult> {
        self.lifecycle.switch_branch(name)?;
        Ok(BranchResult {
            branch: name.to_string(),
            created: false,
        })
    }

    /// Commit everything, formatting `message` through `commit.message_template` when asked.
    pub fn commit(&self, message: &str, template: bool) -> Result<CommitResult> {
        let message = if template {
            self.settings.commit.format_message(message)
        } else {
            message.to_string()
        };
        let commit = self.lifecycle.commit_changes(&message)?;
        Ok(CommitResult {
            commit,
            branch: self.lifecycle.current_branch()?,
            message,
        })
    }

    /// Push `branch` (default: current) to `remote` (default: `repository.remote`).
    ///
    /// When pushing to the configured remote and no URL is known, `resolver`
    /// supplies one; it is registered in the repository and persisted.
    pub fn push(
        &mut self,
        remote: Option<&str>,
        branch: Option<&str>,
        resolver: &mut dyn RemoteUrlResolver,
    ) -> Result<PushResult> {
        let remote = remote
            .map(str::to_string)
            .unwrap_or_else(|| self.settings.repository.remote.clone());
        let mut remote_registered = false;
        let mut remote_url = None;

        if remote == self.settings.repository.remote {
            let configured = self.settings.repository.remote_url().map(str::to_string);
            match configured {
                // An existing remote keeps its own URL, and that is the one pushed to.
                Some(url) => match self.lifecycle.remote_url(&remote)? {
                    Some(actual) => remote_url = Some(actual),
                    None => {
                        self.lifecycle.add_remote(&remote, &url)?;
                        remote_registered = true;
                        remote_url = Some(url);
                    }
                },
                None => {
                    let url = resolver.resolve_missing_remote(&remote)?;
                    self.lifecycle.add_remote(&remote, &url)?;
                    self.store.set("repository.remote_url", url.clone())?;
                    self.settings.repository.remote_url = Some(url.clone());
                    {
                        let _log = self.logger.enter();
                        tracing::info!(remote = %remote, url = %url, "persisted remote URL");
                    }
                    remote_registered = true;
                    remote_url = Some(url);
                }
            }
        } else {
            remote_url = self.lifecycle.remote_url(&remote)?;
        }

        let branch = self.lifecycle.push_changes(&remote, branch)?;
        Ok(PushResult {
            remote,
            branch,
            remote_url,
            remote_registered,
        })
    }

    /// Merge `feature` into `main_branch` (default: `branches.main`).
    ///
    /// A conflict is a successful result; a failed merge is an error.
    pub fn merge(&self, feature: &str, main_branch: Option<&str>) -> Result<MergeResult> {
        let main_branch = main_branch.unwrap_or(&self.settings.branches.main);
        match self.lifecycle.merge_branch(feature, main_branch)? {
            MergeOutcome::Failed { reason } => Err(Error::MergeFailed(reason)),
            outcome => Ok(MergeResult {
                feature: feature.to_string(),
                main_branch: main_branch.to_string(),
                outcome,
            }),
        }
    }

    pub fn resolve_conflicts(&self) -> Result<ConflictCheckResult> {
        match self.lifecycle.resolve_conflicts()? {
            MergeOutcome::Failed { reason } => Err(Error::Other(format!(
                "Failed to check for conflicts: {}",
                reason
            ))),
            outcome => Ok(ConflictCheckResult { outcome }),
        }
    }
}
