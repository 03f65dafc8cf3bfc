// `autosync daemon`: edit and list the repositories autosyncd watches.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use serde::Serialize;

use autosync_daemon::config::{daemon_config_path, ConfigProvider, DaemonConfig, GitConfigProvider};
use autosync_daemon::git::GitWorker;

use super::absolutize;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    action: DaemonAction,

    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum DaemonAction {
    /// Start watching a repository
    Add {
        /// Repository path (defaults to the current directory).
        path: Option<PathBuf>,
    },
    /// Stop watching a repository
    Rm {
        /// Repository path (defaults to the current directory).
        path: Option<PathBuf>,
    },
    /// List watched repositories
    Ls,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RepoList {
    pub repos: Vec<PathBuf>,
}

pub fn run(args: DaemonArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = daemon_config_path()
        .context("could not determine home directory")
        .and_then(|config_path| apply(&config_path, args.action));

    match result {
        Ok(list) => {
            output::print_output(format, &list, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn apply(config_path: &Path, action: DaemonAction) -> anyhow::Result<RepoList> {
    let mut config = DaemonConfig::load_or_default(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    match action {
        DaemonAction::Add { path } => {
            let path = path.unwrap_or_else(|| PathBuf::from("."));
            let repo = GitConfigProvider::new(config.env_pairs())
                .load(&path)
                .with_context(|| format!("cannot watch {}", path.display()))?;
            config.add_repo(repo.root).context("failed to add repository")?;
            config.save_to(config_path).context("failed to save daemon config")?;
        }
        DaemonAction::Rm { path } => {
            let path = watched_root(&path.unwrap_or_else(|| PathBuf::from(".")), &config)?;
            config.remove_repo(&path).context("failed to remove repository")?;
            config.save_to(config_path).context("failed to save daemon config")?;
        }
        DaemonAction::Ls => {}
    }

    Ok(RepoList { repos: config.repos })
}

/// The key `add` stored for `path`: the canonical top level of its working
/// tree. Paths that are no longer inside a repository are only absolutized.
fn watched_root(path: &Path, config: &DaemonConfig) -> anyhow::Result<PathBuf> {
    let worker = GitWorker::new(path).with_env(config.env_pairs()).with_remote_url(None);
    if let Some(root) = worker.show_toplevel().ok().and_then(|top| top.canonicalize().ok()) {
        return Ok(root);
    }
    absolutize(path)
}

fn format_human(list: &RepoList) -> String {
    if list.repos.is_empty() {
        return "no repositories watched".to_string();
    }
    list.repos.iter().map(|repo| repo.display().to_string()).collect::<Vec<_>>().join("\n")
}
