// CLI subcommand dispatch.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;

use autosync_daemon::config::{ConfigProvider, DaemonConfig, GitConfigProvider, RepositoryConfig};

pub mod check_ignore;
pub mod config;
pub mod daemon;
pub mod sync;
pub mod watch;

#[derive(Subcommand)]
pub enum Command {
    /// Watch a repository in the foreground until Ctrl-C
    Watch(watch::WatchArgs),
    /// Run one commit-and-push attempt
    Sync(sync::SyncArgs),
    /// Report whether paths would be left out of commits
    CheckIgnore(check_ignore::CheckIgnoreArgs),
    /// Show the resolved configuration for a repository
    Config(config::ConfigArgs),
    /// Manage the repositories autosyncd watches
    Daemon(daemon::DaemonArgs),
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Watch(args) => watch::run(args),
        Command::Sync(args) => sync::run(args),
        Command::CheckIgnore(args) => check_ignore::run(args),
        Command::Config(args) => config::run(args),
        Command::Daemon(args) => daemon::run(args),
    }
}

/// Load a repository's configuration, merging the daemon-wide extra env.
pub(crate) fn load_repo_config(path: Option<&Path>) -> anyhow::Result<RepositoryConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let daemon = DaemonConfig::load().context("failed to load daemon config")?;
    let provider = GitConfigProvider::new(daemon.env_pairs());
    provider
        .load(&path)
        .with_context(|| format!("failed to load repository config for {}", path.display()))
}

/// Make `path` absolute against the current directory, resolving symlinks in
/// the parent so it compares equal to a canonical repository root. The final
/// component may not exist.
pub(crate) fn absolutize(path: &Path) -> anyhow::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().context("failed to read current directory")?.join(path)
    };

    if let Ok(canonical) = absolute.canonicalize() {
        return Ok(canonical);
    }
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => Ok(parent.join(name)),
            Err(_) => Ok(absolute),
        },
        _ => Ok(absolute),
    }
}
