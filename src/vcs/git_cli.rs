//! [`Vcs`] implementation backed by the `git` executable.
//!
//! All commands run with `LC_ALL=C` so that status and error text can be
//! matched reliably, and with `GIT_TERMINAL_PROMPT=0` so that remote
//! operations fail instead of waiting for credentials.

use super::{CommitIdentity, RepoHandle, Vcs};
use crate::{Error, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Shells out to `git` for every operation.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    identity: Option<CommitIdentity>,
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit as `identity` instead of whatever git config provides.
    pub fn with_identity(mut self, identity: CommitIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new("git");
        if let Some(identity) = &self.identity {
            cmd.arg("-c")
                .arg(format!("user.name={}", identity.name))
                .arg("-c")
                .arg(format!("user.email={}", identity.email));
        }
        cmd.current_dir(dir)
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_EDITOR", "true")
            .env("GIT_MERGE_AUTOEDIT", "no");
        cmd
    }

    /// Run git and return the raw output, whatever the exit status.
    fn output(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        self.command(dir).args(args).output().map_err(|e| Error::Git {
            command: args.first().unwrap_or(&"").to_string(),
            message: format!("failed to run git: {}", e),
        })
    }

    /// Run git and return stdout; a non-zero exit becomes [`Error::Git`].
    fn run(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let output = self.output(dir, args)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(failure(args, &output))
        }
    }
}

/// Build an error from a failed command, keeping both streams.
///
/// git reports merge conflicts on stdout and most other failures on stderr.
fn failure(args: &[&str], output: &Output) -> Error {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = [stdout.trim(), stderr.trim()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    Error::Git {
        command: args.first().unwrap_or(&"").to_string(),
        message: if message.is_empty() {
            format!("exited with {}", output.status)
        } else {
            message
        },
    }
}

fn lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

impl Vcs for GitCli {
    fn open(&self, path: &Path) -> Result<RepoHandle> {
        if !path.is_dir() {
            return Err(Error::RepositoryNotFound(path.to_path_buf()));
        }
        // Only the working tree root counts, not a directory nested inside another repository.
        if !path.join(".git").exists() {
            return Err(Error::RepositoryNotFound(path.to_path_buf()));
        }
        self.run(path, &["rev-parse", "--git-dir"])?;
        Ok(RepoHandle::new(path.to_path_buf()))
    }

    fn init(&self, path: &Path, initial_branch: &str) -> Result<RepoHandle> {
        self.run(path, &["init", "--quiet"])?;
        // Works on every git version, unlike `init --initial-branch`.
        let head = format!("refs/heads/{}", initial_branch);
        self.run(path, &["symbolic-ref", "HEAD", &head])?;
        Ok(RepoHandle::new(path.to_path_buf()))
    }

    fn has_commits(&self, repo: &RepoHandle) -> Result<bool> {
        let output = self.output(repo.root(), &["rev-parse", "--quiet", "--verify", "HEAD"])?;
        Ok(output.status.success())
    }

    fn list_branches(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        let out = self.run(
            repo.root(),
            &["for-each-ref", "--format=%(refname:short)", "refs/heads/"],
        )?;
        Ok(lines(&out))
    }

    fn current_branch(&self, repo: &RepoHandle) -> Result<String> {
        let out = self.run(repo.root(), &["symbolic-ref", "--short", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    fn create_branch(&self, repo: &RepoHandle, name: &str) -> Result<()> {
        self.run(repo.root(), &["branch", name])?;
        Ok(())
    }

    fn checkout(&self, repo: &RepoHandle, name: &str) -> Result<()> {
        self.run(repo.root(), &["checkout", "--quiet", name])?;
        Ok(())
    }

    fn is_dirty(&self, repo: &RepoHandle) -> Result<bool> {
        let out = self.run(
            repo.root(),
            &["status", "--porcelain", "--untracked-files=no"],
        )?;
        Ok(!out.trim().is_empty())
    }

    fn untracked(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        let out = self.run(repo.root(), &["ls-files", "--others", "--exclude-standard"])?;
        Ok(lines(&out))
    }

    fn stage(&self, repo: &RepoHandle, paths: &[&str]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.run(repo.root(), &args)?;
        Ok(())
    }

    fn stage_all(&self, repo: &RepoHandle) -> Result<()> {
        self.run(repo.root(), &["add", "--all"])?;
        Ok(())
    }

    fn commit(&self, repo: &RepoHandle, message: &str) -> Result<String> {
        self.run(repo.root(), &["commit", "--quiet", "--no-verify", "-m", message])?;
        let out = self.run(repo.root(), &["rev-parse", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    fn merge(&self, repo: &RepoHandle, branch: &str) -> Result<()> {
        self.run(repo.root(), &["merge", "--no-edit", branch])?;
        Ok(())
    }

    fn merge_squash(&self, repo: &RepoHandle, branch: &str) -> Result<()> {
        self.run(repo.root(), &["merge", "--squash", branch])?;
        Ok(())
    }

    fn merge_fast_forward(&self, repo: &RepoHandle, branch: &str) -> Result<()> {
        self.run(repo.root(), &["merge", "--ff-only", branch])?;
        Ok(())
    }

    fn rebase(&self, repo: &RepoHandle, onto: &str) -> Result<()> {
        self.run(repo.root(), &["rebase", onto])?;
        Ok(())
    }

    fn status(&self, repo: &RepoHandle) -> Result<String> {
        self.run(repo.root(), &["status"])
    }

    fn unmerged_paths(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        let out = self.run(repo.root(), &["diff", "--name-only", "--diff-filter=U"])?;
        Ok(lines(&out))
    }

    fn remote_url(&self, repo: &RepoHandle, name: &str) -> Result<Option<String>> {
        let remotes = lines(&self.run(repo.root(), &["remote"])?);
        if !remotes.iter().any(|r| r == name) {
            return Ok(None);
        }
        let out = self.run(repo.root(), &["remote", "get-url", name])?;
        Ok(Some(out.trim().to_string()))
    }

    fn remote_set(&self, repo: &RepoHandle, name: &str, url: &str) -> Result<()> {
        if self.remote_url(repo, name)?.is_some() {
            self.run(repo.root(), &["remote", "set-url", name, url])?;
        } else {
            self.run(repo.root(), &["remote", "add", name, url])?;
        }
        Ok(())
    }

    fn remote_update(&self, repo: &RepoHandle, name: &str) -> Result<()> {
        self.run(repo.root(), &["remote", "update", name])?;
        Ok(())
    }

    fn push(&self, repo: &RepoHandle, remote: &str, branch: &str) -> Result<()> {
        self.run(repo.root(), &["push", "--set-upstream", remote, branch])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestRepo, test_git};

    fn bootstrapped() -> (TestRepo, RepoHandle) {
        let env = TestRepo::new();
        let git = test_git();
        let repo = git.init(env.path(), "main").unwrap();
        env.write("README.md", "# Initial commit\n");
        git.stage(&repo, &["README.md"]).unwrap();
        git.commit(&repo, "Initial commit").unwrap();
        (env, repo)
    }

    #[test]
    fn test_open_requires_repository_root() {
        let env = TestRepo::new();
        let git = test_git();
        assert!(matches!(git.open(env.path()), Err(Error::RepositoryNotFound(_))));

        git.init(env.path(), "main").unwrap();
        std::fs::create_dir(env.path().join("sub")).unwrap();
        assert!(git.open(env.path()).is_ok());
        assert!(matches!(
            git.open(&env.path().join("sub")),
            Err(Error::RepositoryNotFound(_))
        ));
    }

    #[test]
    fn test_init_uses_initial_branch() {
        let (_env, repo) = bootstrapped();
        let git = test_git();
        assert_eq!(git.current_branch(&repo).unwrap(), "main");
        assert_eq!(git.list_branches(&repo).unwrap(), vec!["main".to_string()]);
    }

    #[test]
    fn test_has_commits() {
        let env = TestRepo::new();
        let git = test_git();
        let repo = git.init(env.path(), "main").unwrap();
        assert!(!git.has_commits(&repo).unwrap());

        env.write("README.md", "# Initial commit\n");
        git.stage(&repo, &["README.md"]).unwrap();
        git.commit(&repo, "Initial commit").unwrap();
        assert!(git.has_commits(&repo).unwrap());
    }

    #[test]
    fn test_dirty_and_untracked() {
        let (env, repo) = bootstrapped();
        let git = test_git();
        assert!(!git.is_dirty(&repo).unwrap());
        assert!(git.untracked(&repo).unwrap().is_empty());

        env.write("new.txt", "hi");
        assert!(!git.is_dirty(&repo).unwrap());
        assert_eq!(git.untracked(&repo).unwrap(), vec!["new.txt".to_string()]);

        env.write("README.md", "changed\n");
        assert!(git.is_dirty(&repo).unwrap());
    }

    #[test]
    fn test_commit_returns_head() {
        let (env, repo) = bootstrapped();
        let git = test_git();
        env.write("a.txt", "a");
        git.stage_all(&repo).unwrap();
        let id = git.commit(&repo, "add a").unwrap();
        assert_eq!(id, env.git(&["rev-parse", "HEAD"]));
        assert_eq!(
            env.git(&["log", "-1", "--format=%an <%ae>"]),
            "Test Agent <agent@example.com>"
        );
    }

    #[test]
    fn test_failed_command_keeps_message() {
        let (_env, repo) = bootstrapped();
        let git = test_git();
        match git.checkout(&repo, "does-not-exist") {
            Err(Error::Git { command, message }) => {
                assert_eq!(command, "checkout");
                assert!(message.contains("does-not-exist"), "message: {message}");
            }
            other => panic!("expected git error, got {other:?}"),
        }
    }

    #[test]
    fn test_remote_set_adds_then_updates() {
        let (_env, repo) = bootstrapped();
        let git = test_git();
        assert_eq!(git.remote_url(&repo, "origin").unwrap(), None);

        git.remote_set(&repo, "origin", "https://example.com/a.git").unwrap();
        assert_eq!(
            git.remote_url(&repo, "origin").unwrap().as_deref(),
            Some("https://example.com/a.git")
        );

        git.remote_set(&repo, "origin", "https://example.com/b.git").unwrap();
        assert_eq!(
            git.remote_url(&repo, "origin").unwrap().as_deref(),
            Some("https://example.com/b.git")
        );
    }
}
