//! Merge attempts and conflict detection.
//!
//! A merge ends in one of three states, see [`MergeOutcome`]. A conflicted
//! merge is left exactly as git leaves it: nothing is aborted and nothing is
//! resolved automatically. After editing and staging the files the operator
//! re-runs [`MergeConflictResolver::check_conflict_state`], which only reads
//! status and never retries the merge.

use crate::config::{MergeSettings, MergeStrategy};
use crate::vcs::{RepoHandle, Vcs};
use crate::Error;
use serde::Serialize;

/// Marker git prints in `git status` while conflicts are unresolved.
const UNMERGED_MARKER: &str = "unmerged paths";

/// Result of a merge attempt or conflict check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum MergeOutcome {
    /// Fast-forwarded, auto-merged, or nothing left to resolve
    Clean,
    /// Unmerged paths remain; the working tree needs manual edits
    Conflict { paths: Vec<String> },
    /// Any other failure
    Failed { reason: String },
}

impl MergeOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, MergeOutcome::Clean)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, MergeOutcome::Conflict { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeOutcome::Clean => "clean",
            MergeOutcome::Conflict { .. } => "conflict",
            MergeOutcome::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// True if a failure message from git reports conflicting or unmerged paths.
pub fn is_conflict_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("conflict") || lower.contains("unmerged")
}

/// Runs merges for one open repository.
pub struct MergeConflictResolver<'a, V: Vcs> {
    vcs: &'a V,
    repo: &'a RepoHandle,
    settings: MergeSettings,
}

impl<'a, V: Vcs> MergeConflictResolver<'a, V> {
    pub fn new(vcs: &'a V, repo: &'a RepoHandle, settings: MergeSettings) -> Self {
        Self {
            vcs,
            repo,
            settings,
        }
    }

    /// Bring `feature` into `main_branch` using the configured strategy.
    ///
    /// The checked-out branch afterwards is `main_branch`, except for a
    /// conflicted rebase, which stays on `feature` with the rebase in progress.
    pub fn merge_branch(&self, feature: &str, main_branch: &str) -> MergeOutcome {
        let branches = match self.vcs.list_branches(self.repo) {
            Ok(branches) => branches,
            Err(e) => return failed(e),
        };
        for name in [main_branch, feature] {
            if !branches.iter().any(|b| b == name) {
                return failed(Error::BranchNotFound(name.to_string()));
            }
        }

        match self.settings.strategy {
            MergeStrategy::Merge if self.settings.squash => {
                self.squash_merge(feature, main_branch)
            }
            MergeStrategy::Merge => self.merge(feature, main_branch),
            MergeStrategy::Rebase => self.rebase(feature, main_branch),
        }
    }

    /// Inspect the working tree for unresolved conflicts.
    pub fn check_conflict_state(&self) -> MergeOutcome {
        match self.vcs.status(self.repo) {
            Ok(status) if status.to_lowercase().contains(UNMERGED_MARKER) => {
                let paths = match self.vcs.unmerged_paths(self.repo) {
                    Ok(paths) => paths,
                    Err(e) => {
                        tracing::warn!(error = %e, "could not list unmerged paths");
                        Vec::new()
                    }
                };
                MergeOutcome::Conflict { paths }
            }
            Ok(_) => MergeOutcome::Clean,
            Err(e) => failed(e),
        }
    }

    fn merge(&self, feature: &str, main_branch: &str) -> MergeOutcome {
        if let Err(e) = self.vcs.checkout(self.repo, main_branch) {
            return failed(e);
        }
        match self.vcs.merge(self.repo, feature) {
            Ok(()) => MergeOutcome::Clean,
            Err(e) => self.classify(e),
        }
    }

    fn squash_merge(&self, feature: &str, main_branch: &str) -> MergeOutcome {
        if let Err(e) = self.vcs.checkout(self.repo, main_branch) {
            return failed(e);
        }
        if let Err(e) = self.vcs.merge_squash(self.repo, feature) {
            return self.classify(e);
        }
        // An already-merged feature stages nothing.
        match self.vcs.is_dirty(self.repo) {
            Ok(false) => MergeOutcome::Clean,
            Ok(true) => {
                let message = format!("Squash merge branch '{}'", feature);
                match self.vcs.commit(self.repo, &message) {
                    Ok(_) => MergeOutcome::Clean,
                    Err(e) => failed(e),
                }
            }
            Err(e) => failed(e),
        }
    }

    fn rebase(&self, feature: &str, main_branch: &str) -> MergeOutcome {
        if let Err(e) = self.vcs.checkout(self.repo, feature) {
            return failed(e);
        }
        if let Err(e) = self.vcs.rebase(self.repo, main_branch) {
            return self.classify(e);
        }
        if let Err(e) = self.vcs.checkout(self.repo, main_branch) {
            return failed(e);
        }
        match self.vcs.merge_fast_forward(self.repo, feature) {
            Ok(()) => MergeOutcome::Clean,
            Err(e) => failed(e),
        }
    }

    /// Conflict only if git said so and unmerged paths really exist.
    fn classify(&self, error: Error) -> MergeOutcome {
        let message = match &error {
            Error::Git { message, .. } => message.clone(),
            other => other.to_string(),
        };
        if !is_conflict_message(&message) {
            return failed(error);
        }
        match self.vcs.unmerged_paths(self.repo) {
            Ok(paths) if !paths.is_empty() => MergeOutcome::Conflict { paths },
            _ => failed(error),
        }
    }
}

fn failed(error: Error) -> MergeOutcome {
    MergeOutcome::Failed {
        reason: error.to_string(),
    }
}
