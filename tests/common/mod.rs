//! Common test utilities for fbt integration tests.
//!
//! Provides `TestEnv` for isolated test environments: every test gets its own
//! working tree, config file, and persistent overlay directory.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with isolated config and repository directories.
///
/// Each `TestEnv` creates two temporary directories:
/// - `repo_dir`: the working tree handed to `fbt init --repo-path`
/// - `config_dir`: holds `config.yaml` and the overlay (via `FBT_DATA_DIR`)
///
/// The `fbt()` method returns a `Command` that sets `FBT_CONFIG` and
/// `FBT_DATA_DIR` per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub repo_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            repo_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and run `fbt init` on its working tree.
    pub fn init() -> Self {
        let env = Self::new();
        env.fbt()
            .args(["init", "--repo-path"])
            .arg(env.repo_path())
            .assert()
            .success();
        env
    }

    /// Get a Command for the fbt binary bound to this environment's config.
    pub fn fbt(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_fbt"));
        cmd.current_dir(self.config_dir.path());
        cmd.env("FBT_CONFIG", self.config_path());
        cmd.env("FBT_DATA_DIR", self.overlay_dir());
        cmd.env_remove("FBT_REMOTE_URL");
        cmd.env_remove("FBT_LOG");
        cmd
    }

    pub fn repo_path(&self) -> &Path {
        self.repo_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.path().join("config.yaml")
    }

    pub fn overlay_dir(&self) -> PathBuf {
        self.config_dir.path().join(".fbt")
    }

    pub fn overlay_path(&self) -> PathBuf {
        self.overlay_dir().join("persistent_config.json")
    }

    /// Parsed overlay contents.
    pub fn overlay(&self) -> serde_json::Value {
        let content = std::fs::read_to_string(self.overlay_path()).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    /// Write `content` to `name` inside the working tree.
    pub fn write(&self, name: &str, content: &str) {
        let path = self.repo_path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.repo_path().join(name)).unwrap()
    }

    /// Run raw git in the working tree and return trimmed stdout.
    pub fn git(&self, args: &[&str]) -> String {
        git_in(self.repo_path(), args)
    }

    pub fn head_branch(&self) -> String {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn commit_count(&self) -> usize {
        self.git(&["rev-list", "--count", "HEAD"]).parse().unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Run raw git in `dir` and return trimmed stdout.
pub fn git_in(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .args(["-c", "user.name=Test Agent", "-c", "user.email=agent@example.com"])
        .args(args)
        .current_dir(dir)
        .env("LC_ALL", "C")
        .output()
        .unwrap();
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare repository usable as a push target.
pub fn bare_remote() -> TempDir {
    let dir = TempDir::new().unwrap();
    git_in(dir.path(), &["init", "--bare", "--quiet"]);
    assert!(dir.path().join("HEAD").exists());
    dir
}
