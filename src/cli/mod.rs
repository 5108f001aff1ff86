//! CLI argument definitions for fbt.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("FBT_GIT_COMMIT"),
    " ",
    env!("FBT_BUILD_TIMESTAMP"),
    ")"
);

/// Feature Branch Toolbox - feature-branch git workflow for AI agents.
///
/// Start with `fbt init --repo-path <PATH>`, then create a feature branch,
/// commit, and merge it back into main.
#[derive(Parser, Debug)]
#[command(name = "fbt")]
#[command(
    author,
    version,
    long_version = VERSION,
    about = "Feature-branch git workflow automation for AI agents",
    long_about = None
)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Path to the YAML configuration file.
    /// Can also be set via FBT_CONFIG environment variable.
    #[arg(
        long = "config-path",
        global = true,
        env = "FBT_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config_path: PathBuf,

    /// Log to stderr (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the repository and record it in the configuration
    ///
    /// Creates the repository (with a bootstrap commit) when the directory
    /// holds none, otherwise connects to the existing one.
    Init {
        /// Path to the Git repository (must exist)
        #[arg(long = "repo-path")]
        repo_path: PathBuf,

        /// URL of the remote repository
        #[arg(long = "remote-url")]
        remote_url: Option<String>,
    },

    /// Create a new branch and switch to it
    CreateBranch {
        /// Name of the new branch
        name: String,

        /// Prepend the configured feature prefix (branches.prefix)
        #[arg(long)]
        feature: bool,
    },

    /// Switch to an existing branch
    SwitchBranch {
        /// Name of the branch to switch to
        name: String,
    },

    /// Stage all changes and commit them to the current branch
    Commit {
        /// Commit message
        message: String,

        /// Format the message through commit.message_template
        #[arg(long)]
        template: bool,
    },

    /// Push a branch to the remote repository
    Push {
        /// Name of the remote (default: repository.remote)
        #[arg(long)]
        remote: Option<String>,

        /// Name of the branch to push (default: current branch)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Merge a feature branch into the main branch
    ///
    /// A conflict leaves the working tree conflicted for manual resolution
    /// and still exits successfully.
    Merge {
        /// Name of the feature branch to merge
        feature: String,

        /// Name of the main branch (default: branches.main)
        #[arg(long = "main-branch")]
        main_branch: Option<String>,
    },

    /// Check the working tree for unresolved merge conflicts
    ResolveConflicts,

    /// Show help message
    Help,
}

impl Commands {
    /// Subcommand name as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Init { .. } => "init",
            Commands::CreateBranch { .. } => "create-branch",
            Commands::SwitchBranch { .. } => "switch-branch",
            Commands::Commit { .. } => "commit",
            Commands::Push { .. } => "push",
            Commands::Merge { .. } => "merge",
            Commands::ResolveConflicts => "resolve-conflicts",
            Commands::Help => "help",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_init_with_config_path_after_subcommand() {
        let cli = Cli::try_parse_from([
            "fbt",
            "init",
            "--repo-path",
            "/tmp/repo",
            "--config-path",
            "/tmp/cfg.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config_path, PathBuf::from("/tmp/cfg.yaml"));
        match cli.command {
            Some(Commands::Init {
                repo_path,
                remote_url,
            }) => {
                assert_eq!(repo_path, PathBuf::from("/tmp/repo"));
                assert!(remote_url.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from(["fbt", "-H", "-vv", "create-branch", "login", "--feature"])
            .unwrap();
        assert!(cli.human_readable);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Some(Commands::CreateBranch { ref name, feature: true }) if name == "login"
        ));
    }

    #[test]
    fn test_init_requires_repo_path() {
        assert!(Cli::try_parse_from(["fbt", "init"]).is_err());
    }

    #[test]
    fn test_command_names() {
        let cli = Cli::try_parse_from(["fbt", "resolve-conflicts"]).unwrap();
        assert_eq!(cli.command.unwrap().name(), "resolve-conflicts");
    }
}
