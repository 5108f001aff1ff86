//! fbt - feature-branch git workflow automation for AI agents.

use clap::{CommandFactory, Parser};
use feature_branch_toolbox::cli::{Cli, Commands};
use feature_branch_toolbox::commands::{self, Output, Workflow};
use feature_branch_toolbox::config::ConfigStore;
use feature_branch_toolbox::telemetry::{LogGuard, Logger};
use std::path::Path;
use std::process;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        process::exit(1);
    };

    if let Err(e) = run_command(command, &cli.config_path, cli.verbose, human) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Load the config and build the configured logger.
///
/// The returned guard must outlive every logged operation.
fn load_store(
    config_path: &Path,
    verbose: u8,
) -> Result<(ConfigStore, Logger, LogGuard), feature_branch_toolbox::Error> {
    let bootstrap = Logger::bootstrap(verbose);
    let store = ConfigStore::load(config_path, bootstrap)?;
    let settings = store.settings()?;
    let base_dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    let (logger, guard) = Logger::from_settings(&settings.logging, &base_dir, verbose)?;
    Ok((store.with_logger(logger.clone()), logger, guard))
}

fn run_command(
    command: Commands,
    config_path: &Path,
    verbose: u8,
    human: bool,
) -> Result<(), feature_branch_toolbox::Error> {
    if let Commands::Help = command {
        let _ = Cli::command().print_long_help();
        return Ok(());
    }

    let (mut store, logger, _guard) = load_store(config_path, verbose)?;
    {
        let _log = logger.enter();
        tracing::debug!(command = command.name(), "running command");
    }

    match command {
        Commands::Init {
            repo_path,
            remote_url,
        } => {
            let result = commands::init(&mut store, &repo_path, remote_url.as_deref(), logger)?;
            output(&result, human);
        }
        Commands::CreateBranch { name, feature } => {
            let workflow = Workflow::open(store, logger)?;
            output(&workflow.create_branch(&name, feature)?, human);
        }
        Commands::SwitchBranch { name } => {
            let workflow = Workflow::open(store, logger)?;
            output(&workflow.switch_branch(&name)?, human);
        }
        Commands::Commit { message, template } => {
            let workflow = Workflow::open(store, logger)?;
            output(&workflow.commit(&message, template)?, human);
        }
        Commands::Push { remote, branch } => {
            let mut workflow = Workflow::open(store, logger)?;
            let mut resolver = commands::default_resolver();
            let result = workflow.push(remote.as_deref(), branch.as_deref(), resolver.as_mut())?;
            output(&result, human);
        }
        Commands::Merge {
            feature,
            main_branch,
        } => {
            let workflow = Workflow::open(store, logger)?;
            output(&workflow.merge(&feature, main_branch.as_deref())?, human);
        }
        Commands::ResolveConflicts => {
            let workflow = Workflow::open(store, logger)?;
            output(&workflow.resolve_conflicts()?, human);
        }
        Commands::Help => {}
    }
    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
