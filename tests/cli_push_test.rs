//! Integration tests for `fbt push` and remote URL resolution.

mod common;

use common::{TestEnv, bare_remote, git_in};
use predicates::prelude::*;

#[test]
fn test_push_with_configured_remote() {
    let env = TestEnv::new();
    let remote = bare_remote();
    env.fbt()
        .args(["init", "--repo-path"])
        .arg(env.repo_path())
        .arg("--remote-url")
        .arg(remote.path())
        .assert()
        .success();

    env.fbt()
        .args(["create-branch", "push-me", "--feature"])
        .assert()
        .success();
    env.write("p.txt", "p");
    env.fbt().args(["commit", "push me"]).assert().success();

    env.fbt()
        .arg("push")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"branch\":\"feature/push-me\""))
        .stdout(predicate::str::contains("\"remote_registered\":false"));

    let head = env.git(&["rev-parse", "HEAD"]);
    assert_eq!(
        git_in(remote.path(), &["rev-parse", "refs/heads/feature/push-me"]),
        head
    );
}

#[test]
fn test_push_resolves_url_from_env() {
    let env = TestEnv::init();
    let remote = bare_remote();

    env.fbt()
        .args(["-H", "push", "--branch", "main"])
        .env("FBT_REMOTE_URL", remote.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Added remote 'origin'"))
        .stdout(predicate::str::contains("Successfully pushed 'main' to remote 'origin'"));

    let url = remote.path().to_string_lossy().to_string();
    assert_eq!(env.overlay()["repository.remote_url"], url.as_str());
    assert_eq!(env.git(&["remote", "get-url", "origin"]), url);
}

#[test]
fn test_push_reads_url_from_stdin() {
    let env = TestEnv::init();
    let remote = bare_remote();
    let url = remote.path().to_string_lossy().to_string();

    env.fbt()
        .arg("push")
        .write_stdin(format!("{}\n", url))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"remote_registered\":true"));
    assert_eq!(git_in(remote.path(), &["rev-parse", "--verify", "refs/heads/main"]).len(), 40);
}

#[test]
fn test_push_empty_answer_fails() {
    let env = TestEnv::init();

    env.fbt()
        .args(["-H", "push"])
        .write_stdin("\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No remote URL provided for 'origin'"));
}

#[test]
fn test_push_to_unknown_remote_fails() {
    let env = TestEnv::init();

    env.fbt()
        .args(["push", "--remote", "upstream"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Push failed"));
}
