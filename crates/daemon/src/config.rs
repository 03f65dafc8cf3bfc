// Configuration for the sync daemon.
//
// Per-repository: the `auto-sync` section of the repository's own git config.
// Daemon-wide: `~/.autosync/config.toml` (watched repositories, extra env).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::git::{GitError, GitWorker};

/// Poll interval when `auto-sync.syncInterval` is unset.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(600);
/// Pause after a filesystem event before syncing. Not user-configurable.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

const SECTION: &str = "auto-sync";
const SYNC_INTERVAL_KEY: &str = "syncInterval";
const EXEC_KEY: &str = "exec";

/// Root directory for daemon state: `~/.autosync/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".autosync"))
}

/// Path to the daemon config file: `~/.autosync/config.toml`.
pub fn daemon_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

// ── Repository config ──────────────────────────────────────────────

/// Everything the sync engine needs to know about one watched repository.
/// Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryConfig {
    /// Canonical top level of the working tree.
    pub root: PathBuf,
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    #[serde(with = "duration_secs")]
    pub settle_delay: Duration,
    /// Alternate git executable; the system `git` when unset.
    pub git_exec: Option<PathBuf>,
    /// Extra variables passed to every git invocation.
    pub env: Vec<(String, String)>,
}

impl RepositoryConfig {
    /// Defaults for `root`, with no alternate executable or extra env.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            git_exec: None,
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }
}

/// Produces the configuration for a repository path.
pub trait ConfigProvider {
    fn load(&self, path: &Path) -> Result<RepositoryConfig, ConfigError>;
}

/// Reads the `auto-sync` section of the repository's git config.
#[derive(Debug, Default, Clone)]
pub struct GitConfigProvider {
    /// Merged into every loaded config's `env`.
    pub env: Vec<(String, String)>,
}

impl GitConfigProvider {
    pub fn new(env: Vec<(String, String)>) -> Self {
        Self { env }
    }
}

impl ConfigProvider for GitConfigProvider {
    fn load(&self, path: &Path) -> Result<RepositoryConfig, ConfigError> {
        let probe = GitWorker::new(path).with_env(self.env.clone()).with_remote_url(None);
        let toplevel = probe.show_toplevel().map_err(|source| ConfigError::NotARepository {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        let root = toplevel.canonicalize().map_err(ConfigError::Io)?;

        let mut config = RepositoryConfig::new(root).with_env(self.env.clone());

        let interval_key = format!("{SECTION}.{SYNC_INTERVAL_KEY}");
        if let Some(raw) = probe.config_get(&interval_key).map_err(Box::new)? {
            config.poll_interval = parse_interval(&raw)?;
        }

        let exec_key = format!("{SECTION}.{EXEC_KEY}");
        if let Some(exec) = probe.config_get(&exec_key).map_err(Box::new)? {
            let exec = PathBuf::from(exec);
            std::fs::metadata(&exec)
                .map_err(|source| ConfigError::ExecutableMissing { path: exec.clone(), source })?;
            config.git_exec = Some(exec);
        }

        Ok(config)
    }
}

fn parse_interval(raw: &str) -> Result<Duration, ConfigError> {
    let seconds: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidInterval { value: raw.trim().to_string() })?;
    if seconds == 0 {
        return Err(ConfigError::InvalidInterval { value: raw.trim().to_string() });
    }
    Ok(Duration::from_secs(seconds))
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}

// ── Daemon config ──────────────────────────────────────────────────

/// Daemon configuration at `~/.autosync/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Repositories the daemon watches.
    pub repos: Vec<PathBuf>,
    /// Extra variables for every git invocation (e.g. `SSH_AUTH_SOCK`).
    pub env: BTreeMap<String, String>,
}

impl DaemonConfig {
    /// Load from `~/.autosync/config.toml`. A missing file yields defaults;
    /// an unreadable or malformed one is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = daemon_config_path().ok_or(ConfigError::NoHomeDir)?;
        Self::load_or_default(&path)
    }

    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load_from(path) {
            Err(ConfigError::Io(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Start watching `repo`. Fails if it is already listed.
    pub fn add_repo(&mut self, repo: PathBuf) -> Result<(), ConfigError> {
        if self.repos.contains(&repo) {
            return Err(ConfigError::DuplicateRepo(repo));
        }
        self.repos.push(repo);
        Ok(())
    }

    /// Stop watching `repo`. Fails if it was not listed.
    pub fn remove_repo(&mut self, repo: &Path) -> Result<(), ConfigError> {
        let before = self.repos.len();
        self.repos.retain(|existing| existing != repo);
        if self.repos.len() == before {
            return Err(ConfigError::UnknownRepo(repo.to_path_buf()));
        }
        Ok(())
    }

    /// Extra env as ordered pairs.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        self.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[source] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("config serialize error: {0}")]
    Serialize(#[source] toml::ser::Error),

    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("cannot open repository at {}", path.display())]
    NotARepository {
        path: PathBuf,
        #[source]
        source: Box<GitError>,
    },

    #[error("could not read repository config: {0}")]
    Git(#[from] Box<GitError>),

    #[error("auto-sync.syncInterval must be a positive number of seconds, got `{value}`")]
    InvalidInterval { value: String },

    #[error("auto-sync.exec points at {}, which does not exist", path.display())]
    ExecutableMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is already watched", .0.display())]
    DuplicateRepo(PathBuf),

    #[error("{} is not watched", .0.display())]
    UnknownRepo(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(cwd: &Path, args: &[&str]) {
        let status = Command::new("git").args(args).current_dir(cwd).status().unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo(tmp: &TempDir) -> PathBuf {
        let repo = tmp.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        git(&repo, &["init", "-q"]);
        repo
    }

    // ── RepositoryConfig ───────────────────────────────────────────

    #[test]
    fn repository_config_defaults() {
        let cfg = RepositoryConfig::new("/srv/notes");
        assert_eq!(cfg.poll_interval, Duration::from_secs(600));
        assert_eq!(cfg.settle_delay, Duration::from_secs(1));
        assert!(cfg.git_exec.is_none());
        assert!(cfg.env.is_empty());
    }

    #[test]
    fn repository_config_serializes_durations_as_seconds() {
        let json = serde_json::to_value(RepositoryConfig::new("/srv/notes")).unwrap();
        assert_eq!(json["poll_interval"], 600);
        assert_eq!(json["settle_delay"], 1);
    }

    #[test]
    fn parse_interval_accepts_positive_seconds() {
        assert_eq!(parse_interval("120").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_interval(" 30\n").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn parse_interval_rejects_garbage_and_zero() {
        assert!(matches!(parse_interval("ten"), Err(ConfigError::InvalidInterval { .. })));
        assert!(matches!(parse_interval("0"), Err(ConfigError::InvalidInterval { .. })));
        assert!(matches!(parse_interval("-5"), Err(ConfigError::InvalidInterval { .. })));
    }

    // ── GitConfigProvider ──────────────────────────────────────────

    #[test]
    fn provider_reads_defaults_from_plain_repo() {
        let tmp = TempDir::new().unwrap();
        let repo = init_repo(&tmp);

        let cfg = GitConfigProvider::default().load(&repo).unwrap();
        assert_eq!(cfg.root, repo.canonicalize().unwrap());
        assert_eq!(cfg.poll_interval, DEFAULT_POLL_INTERVAL);
        assert!(cfg.git_exec.is_none());
    }

    #[test]
    fn provider_resolves_toplevel_from_subdirectory() {
        let tmp = TempDir::new().unwrap();
        let repo = init_repo(&tmp);
        let nested = repo.join("notes").join("daily");
        std::fs::create_dir_all(&nested).unwrap();

        let cfg = GitConfigProvider::default().load(&nested).unwrap();
        assert_eq!(cfg.root, repo.canonicalize().unwrap());
    }

    #[test]
    fn provider_reads_sync_interval() {
        let tmp = TempDir::new().unwrap();
        let repo = init_repo(&tmp);
        git(&repo, &["config", "auto-sync.syncInterval", "45"]);

        let cfg = GitConfigProvider::default().load(&repo).unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_secs(45));
    }

    #[test]
    fn provider_rejects_missing_exec() {
        let tmp = TempDir::new().unwrap();
        let repo = init_repo(&tmp);
        git(&repo, &["config", "auto-sync.exec", "/nonexistent/bin/git-xyz"]);

        let error = GitConfigProvider::default().load(&repo).unwrap_err();
        assert!(matches!(error, ConfigError::ExecutableMissing { .. }));
    }

    #[test]
    fn provider_accepts_existing_exec() {
        let tmp = TempDir::new().unwrap();
        let repo = init_repo(&tmp);
        let exec = tmp.path().join("git-wrapper");
        std::fs::write(&exec, "#!/bin/sh\nexec git \"$@\"\n").unwrap();
        git(&repo, &["config", "auto-sync.exec", exec.to_str().unwrap()]);

        let cfg = GitConfigProvider::default().load(&repo).unwrap();
        assert_eq!(cfg.git_exec, Some(exec));
    }

    #[test]
    fn provider_fails_outside_a_repository() {
        let tmp = TempDir::new().unwrap();
        let error = GitConfigProvider::default().load(tmp.path()).unwrap_err();
        assert!(matches!(error, ConfigError::NotARepository { .. }));
    }

    #[test]
    fn provider_forwards_extra_env() {
        let tmp = TempDir::new().unwrap();
        let repo = init_repo(&tmp);
        let env = vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())];

        let cfg = GitConfigProvider::new(env.clone()).load(&repo).unwrap();
        assert_eq!(cfg.env, env);
    }

    // ── DaemonConfig ───────────────────────────────────────────────

    #[test]
    fn daemon_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = DaemonConfig::default();
        cfg.add_repo(PathBuf::from("/home/sync/notes")).unwrap();
        cfg.env.insert("SSH_AUTH_SOCK".into(), "/run/agent.sock".into());
        cfg.save_to(&path).unwrap();

        assert_eq!(DaemonConfig::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn daemon_config_parse_from_toml() {
        let toml_str = r#"
repos = ["/home/sync/notes", "/home/sync/dotfiles"]

[env]
SSH_AUTH_SOCK = "/run/agent.sock"
"#;
        let cfg: DaemonConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.repos.len(), 2);
        assert_eq!(
            cfg.env_pairs(),
            vec![("SSH_AUTH_SOCK".to_string(), "/run/agent.sock".to_string())]
        );
    }

    #[test]
    fn daemon_config_rejects_unknown_fields() {
        let error = toml::from_str::<DaemonConfig>("poll = 5").expect_err("parse should fail");
        assert!(error.to_string().contains("unknown field `poll`"));
    }

    #[test]
    fn daemon_config_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let cfg = DaemonConfig::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(cfg, DaemonConfig::default());
    }

    #[test]
    fn daemon_config_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "repos = [").unwrap();
        assert!(matches!(DaemonConfig::load_or_default(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn daemon_config_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deep").join("nested").join("config.toml");
        DaemonConfig::default().save_to(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn add_repo_rejects_duplicates() {
        let mut cfg = DaemonConfig::default();
        cfg.add_repo(PathBuf::from("/a")).unwrap();
        assert!(matches!(cfg.add_repo(PathBuf::from("/a")), Err(ConfigError::DuplicateRepo(_))));
    }

    #[test]
    fn remove_repo_reports_unknown() {
        let mut cfg = DaemonConfig::default();
        cfg.add_repo(PathBuf::from("/a")).unwrap();
        cfg.remove_repo(Path::new("/a")).unwrap();
        assert!(cfg.repos.is_empty());
        assert!(matches!(cfg.remove_repo(Path::new("/a")), Err(ConfigError::UnknownRepo(_))));
    }

    #[test]
    fn daemon_config_path_is_under_home() {
        let path = daemon_config_path().expect("home dir should resolve");
        assert!(path.ends_with(".autosync/config.toml"));
    }
}
