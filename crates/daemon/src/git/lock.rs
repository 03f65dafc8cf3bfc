// Index lock contention: retry policy and stale lock removal.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

/// Retry policy for commands that fail on `index.lock` contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Sleep after the first failed attempt; doubles after each one.
    pub initial_backoff: Duration,
    /// A lock older than this is presumed abandoned.
    pub stale_after: Duration,
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(120),
            stale_after: Duration::from_secs(4),
        }
    }
}

impl LockRetryPolicy {
    /// Backoff to sleep after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << shift)
    }
}

/// Pull the lock path out of git's `Unable to create '<path>': File exists.`
/// message, falling back to the repository's default index lock.
pub fn lock_path_from_stderr(stderr: &str, repo_root: &Path) -> PathBuf {
    const MARKER: &str = "Unable to create '";
    stderr
        .find(MARKER)
        .map(|start| &stderr[start + MARKER.len()..])
        .and_then(|tail| tail.find('\'').map(|end| &tail[..end]))
        .filter(|path| path.ends_with(".lock"))
        .map(PathBuf::from)
        .unwrap_or_else(|| repo_root.join(".git").join("index.lock"))
}

/// Age of the lock file, or `None` if it no longer exists.
fn lock_age(path: &Path, now: SystemTime) -> io::Result<Option<Duration>> {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let modified = meta.modified()?;
            Ok(Some(now.duration_since(modified).unwrap_or(Duration::ZERO)))
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

/// Remove the lock if it is older than `stale_after`. Returns true when a
/// stale lock was found and removal was attempted. Removal is best-effort.
pub fn remove_if_stale(path: &Path, stale_after: Duration, now: SystemTime) -> bool {
    let age = match lock_age(path, now) {
        Ok(Some(age)) => age,
        Ok(None) => {
            debug!(path = %path.display(), "lock vanished before staleness check");
            return false;
        }
        Err(error) => {
            debug!(path = %path.display(), %error, "could not stat lock file");
            return false;
        }
    };

    if age <= stale_after {
        return false;
    }

    warn!(path = %path.display(), age_ms = age.as_millis() as u64, "git: removing stale lock");
    if let Err(error) = std::fs::remove_file(path) {
        debug!(path = %path.display(), %error, "stale lock removal failed");
    }
    true
}
