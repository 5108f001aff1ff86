//! Where `push` gets a remote URL when none is configured.

use crate::{Error, Result};
use std::io::{BufRead, IsTerminal, Write};

/// Environment variable that answers the remote URL question without prompting.
pub const REMOTE_URL_ENV: &str = "FBT_REMOTE_URL";

/// Supplies a URL for a remote that has none configured.
pub trait RemoteUrlResolver {
    fn resolve_missing_remote(&mut self, remote: &str) -> Result<String>;
}

/// Always answers with the same URL.
#[derive(Debug, Clone)]
pub struct FixedRemoteUrl(pub String);

impl RemoteUrlResolver for FixedRemoteUrl {
    fn resolve_missing_remote(&mut self, remote: &str) -> Result<String> {
        non_empty(remote, &self.0)
    }
}

/// Reads one line from standard input, prompting on stderr when interactive.
#[derive(Debug, Default)]
pub struct StdinRemoteUrl;

impl RemoteUrlResolver for StdinRemoteUrl {
    fn resolve_missing_remote(&mut self, remote: &str) -> Result<String> {
        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            let mut stderr = std::io::stderr();
            write!(stderr, "Remote URL for '{}' is not set. Enter a URL: ", remote)?;
            stderr.flush()?;
        }
        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        non_empty(remote, &line)
    }
}

/// `$FBT_REMOTE_URL` when set, otherwise standard input.
pub fn default_resolver() -> Box<dyn RemoteUrlResolver> {
    match std::env::var(REMOTE_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => Box::new(FixedRemoteUrl(url)),
        _ => Box::new(StdinRemoteUrl),
    }
}

fn non_empty(remote: &str, answer: &str) -> Result<String> {
    let url = answer.trim();
    if url.is_empty() {
        return Err(Error::Other(format!("No remote URL provided for '{}'", remote)));
    }
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_resolver_trims() {
        let mut resolver = FixedRemoteUrl("  https://example.com/repo.git\n".to_string());
        assert_eq!(
            resolver.resolve_missing_remote("origin").unwrap(),
            "https://example.com/repo.git"
        );
    }

    #[test]
    fn test_empty_answer_is_error() {
        let mut resolver = FixedRemoteUrl("   ".to_string());
        let err = resolver.resolve_missing_remote("origin").unwrap_err();
        assert!(err.to_string().contains("origin"));
    }
}
