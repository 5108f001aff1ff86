//! Feature Branch Toolbox - feature-branch git workflow automation for AI agents.
//!
//! This library provides the core functionality for the `fbt` CLI tool:
//! layered workflow configuration, the repository lifecycle, and the
//! merge/conflict state machine built on top of the `git` executable.

pub mod cli;
pub mod commands;
pub mod config;
pub mod repository;
pub mod telemetry;
pub mod vcs;

use std::path::PathBuf;

/// Test utilities for isolated git fixtures.
#[cfg(test)]
pub(crate) mod test_utils {
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use tempfile::TempDir;

    use crate::repository::RepositoryLifecycle;
    use crate::telemetry::Logger;
    use crate::vcs::{CommitIdentity, GitCli};

    /// Identity used for every commit made by tests.
    pub fn test_identity() -> CommitIdentity {
        CommitIdentity::new("Test Agent", "agent@example.com")
    }

    /// A git CLI backend that commits as [`test_identity`].
    pub fn test_git() -> GitCli {
        GitCli::new().with_identity(test_identity())
    }

    /// A disconnected lifecycle wired to the test backend.
    pub fn test_lifecycle() -> RepositoryLifecycle<GitCli> {
        RepositoryLifecycle::new(test_git(), Logger::disabled())
    }

    /// A temporary directory used as a working tree.
    ///
    /// Nothing is initialized; pair with [`test_lifecycle`] and call
    /// `initialize(env.path())` to get a bootstrapped repository.
    pub struct TestRepo {
        pub dir: TempDir,
    }

    impl TestRepo {
        pub fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
            }
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        /// Write `content` to `name` (relative to the working tree).
        pub fn write(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, content).unwrap();
            path
        }

        pub fn read(&self, name: &str) -> String {
            std::fs::read_to_string(self.dir.path().join(name)).unwrap()
        }

        /// Run raw git in the working tree and return trimmed stdout.
        pub fn git(&self, args: &[&str]) -> String {
            let output = Command::new("git")
                .args(["-c", "user.name=Test Agent", "-c", "user.email=agent@example.com"])
                .args(args)
                .current_dir(self.dir.path())
                .env("LC_ALL", "C")
                .output()
                .unwrap();
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }

        pub fn commit_count(&self) -> usize {
            self.git(&["rev-list", "--count", "HEAD"]).parse().unwrap()
        }

        pub fn tracked_file_count(&self) -> usize {
            self.git(&["ls-tree", "-r", "--name-only", "HEAD"])
                .lines()
                .filter(|l| !l.is_empty())
                .count()
        }

        pub fn head_branch(&self) -> String {
            self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
        }
    }

    impl Default for TestRepo {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Library-level error type for workflow operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse config file {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("Invalid configuration in '{}': {reason}", config_location(.section, .field))]
    ConfigValidation {
        section: String,
        field: String,
        reason: String,
    },

    #[error("Repository path does not exist: {}", .0.display())]
    RepositoryNotFound(PathBuf),

    #[error("Not connected to a repository")]
    NotConnected,

    #[error("Branch '{0}' does not exist")]
    BranchNotFound(String),

    #[error("Branch '{0}' already exists")]
    BranchExists(String),

    #[error("No changes to commit")]
    NothingToCommit,

    #[error("Merge failed: {0}")]
    MergeFailed(String),

    #[error("Remote operation failed: {0}")]
    RemoteOperationFailed(String),

    #[error("Push failed: {0}")]
    PushFailed(String),

    #[error("Repository path not set: run `fbt init --repo-path <PATH>` first")]
    NotInitialized,

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for workflow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Dotted `section.field` path of a validation error. Section-level errors
/// carry a parenthesized placeholder field and name only the section.
fn config_location(section: &str, field: &str) -> String {
    if field.starts_with('(') {
        section.to_string()
    } else {
        format!("{}.{}", section, field)
    }
}
