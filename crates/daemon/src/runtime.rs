// Multi-repository runtime: one independent coordinator per watched repo.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{ConfigProvider, DaemonConfig, GitConfigProvider};
use crate::watcher::watch_repository;

pub struct DaemonHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(PathBuf, JoinHandle<Result<()>>)>,
}

impl DaemonHandle {
    /// Repositories with a running coordinator.
    pub fn repos(&self) -> impl Iterator<Item = &PathBuf> {
        self.tasks.iter().map(|(repo, _)| repo)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Request shutdown and wait for every coordinator to stop.
    pub async fn wait(mut self) {
        self.shutdown();
        for (repo, task) in self.tasks.drain(..) {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => error!(repo = %repo.display(), error = %format!("{error:#}"), "daemon: watch failed"),
                Err(error) => error!(repo = %repo.display(), %error, "daemon: watch task panicked"),
            }
        }
    }
}

impl Drop for DaemonHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start a coordinator for every repository in `config`. A repository whose
/// configuration cannot be loaded is logged and skipped; it is an error if
/// none can be started.
pub fn start(config: &DaemonConfig, provider: &dyn ConfigProvider) -> Result<DaemonHandle> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    for repo in &config.repos {
        let repo_config = match provider.load(repo) {
            Ok(repo_config) => repo_config,
            Err(error) => {
                warn!(repo = %repo.display(), %error, "daemon: skipping repository");
                continue;
            }
        };
        info!(
            repo = %repo_config.root.display(),
            poll_secs = repo_config.poll_interval.as_secs(),
            "daemon: watching repository"
        );
        let root = repo_config.root.clone();
        let task = tokio::spawn(watch_repository(repo_config, shutdown_rx.clone()));
        tasks.push((root, task));
    }

    if tasks.is_empty() {
        bail!("no repository could be started ({} configured)", config.repos.len());
    }

    Ok(DaemonHandle { shutdown_tx, tasks })
}

/// Run until Ctrl-C using `~/.autosync/config.toml`.
pub async fn run_standalone() -> Result<()> {
    let config = DaemonConfig::load().context("failed to load daemon config")?;
    let provider = GitConfigProvider::new(config.env_pairs());
    let handle = start(&config, &provider)?;

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("daemon: shutting down");
    handle.wait().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    use crate::config::{ConfigError, RepositoryConfig};
    use tempfile::TempDir;

    /// Loads a config for paths that exist, fails for the rest.
    struct ExistingDirs;

    impl ConfigProvider for ExistingDirs {
        fn load(&self, path: &Path) -> Result<RepositoryConfig, ConfigError> {
            let root = path.canonicalize().map_err(ConfigError::Io)?;
            let mut config = RepositoryConfig::new(root);
            config.poll_interval = Duration::from_secs(3600);
            // A nonexistent executable makes every sync attempt fail fast.
            config.git_exec = Some(PathBuf::from("/nonexistent/git"));
            Ok(config)
        }
    }

    #[tokio::test]
    async fn no_startable_repository_is_an_error() {
        let config = DaemonConfig { repos: vec![PathBuf::from("/nonexistent/repo")], ..Default::default() };
        let error = start(&config, &ExistingDirs).err().expect("start should fail");
        assert!(error.to_string().contains("no repository could be started"));
    }

    #[tokio::test]
    async fn empty_config_is_an_error() {
        assert!(start(&DaemonConfig::default(), &ExistingDirs).is_err());
    }

    #[tokio::test]
    async fn unloadable_repositories_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let config = DaemonConfig {
            repos: vec![PathBuf::from("/nonexistent/repo"), tmp.path().to_path_buf()],
            ..Default::default()
        };

        let handle = start(&config, &ExistingDirs).unwrap();
        let repos: Vec<&PathBuf> = handle.repos().collect();
        assert_eq!(repos, vec![&tmp.path().canonicalize().unwrap()]);

        tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .expect("daemon did not stop");
    }
}
