// Structured failures from the git command executor.
//
// Classification happens once, here, from the exit status and stderr of the
// failed command. Callers match on `FailureKind` instead of raw text.

use std::fmt::{self, Display, Formatter};

/// Why a git invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Another process holds `index.lock`.
    IndexLocked,
    /// Push rejected because the remote moved ahead.
    NonFastForward,
    /// Push could not lock a ref on the remote.
    RefLockConflict,
    /// Generic "failed to push some refs".
    PushRejected,
    /// The executable could not be started at all.
    Spawn,
    Other,
}

/// Stderr markers, checked in order. The first match wins, so the more
/// specific push failures come before the generic rejection.
const CLASSIFICATION_TABLE: &[(FailureKind, &[&str])] = &[
    (FailureKind::IndexLocked, &["index.lock", "Unable to create"]),
    (FailureKind::NonFastForward, &["non-fast-forward"]),
    (FailureKind::RefLockConflict, &["cannot lock ref"]),
    (FailureKind::PushRejected, &["failed to push some refs"]),
];

impl FailureKind {
    /// Classify a failed command from its captured stderr.
    pub fn classify(stderr: &str) -> Self {
        CLASSIFICATION_TABLE
            .iter()
            .find(|(_, markers)| markers.iter().all(|marker| stderr.contains(marker)))
            .map(|(kind, _)| *kind)
            .unwrap_or(Self::Other)
    }

    /// Push failures that a fetch + rebase may resolve.
    pub fn is_push_transient(self) -> bool {
        matches!(self, Self::NonFastForward | Self::RefLockConflict | Self::PushRejected)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IndexLocked => "index_locked",
            Self::NonFastForward => "non_fast_forward",
            Self::RefLockConflict => "ref_lock_conflict",
            Self::PushRejected => "push_rejected",
            Self::Spawn => "spawn",
            Self::Other => "other",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed git command with everything needed to diagnose it without
/// re-running: the command line, the sanitized environment, and both
/// output streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitError {
    pub kind: FailureKind,
    pub command: String,
    pub env: Vec<(String, String)>,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub attempts: u32,
}

impl GitError {
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub(crate) fn spawn(
        command: String,
        env: Vec<(String, String)>,
        error: &std::io::Error,
    ) -> Self {
        Self {
            kind: FailureKind::Spawn,
            command,
            env,
            code: None,
            stdout: String::new(),
            stderr: error.to_string(),
            attempts: 1,
        }
    }

    /// Build a diagnostic for output that could not be interpreted.
    pub(crate) fn unexpected_output(command: String, stdout: String, detail: String) -> Self {
        Self {
            kind: FailureKind::Other,
            command,
            env: Vec::new(),
            code: Some(0),
            stdout,
            stderr: detail,
            attempts: 1,
        }
    }
}

impl Display for GitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` failed ({}, code {:?}) after {} attempt(s)\nEnv: {}\nStdOut: {}\nStdErr: {}",
            self.command,
            self.kind,
            self.code,
            self.attempts,
            format_env(&self.env),
            self.stdout.trim_end(),
            self.stderr.trim_end()
        )
    }
}

impl std::error::Error for GitError {}

fn format_env(env: &[(String, String)]) -> String {
    let pairs: Vec<String> = env.iter().map(|(key, value)| format!("{key}={value}")).collect();
    format!("[{}]", pairs.join(" "))
}
