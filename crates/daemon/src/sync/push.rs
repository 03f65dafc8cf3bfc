// Push pipeline: push to the upstream, recovering from rejections by
// fetching and rebasing between attempts.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::git::{GitError, VcsBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushRetryPolicy {
    /// Total push attempts, including the first.
    pub attempts: u32,
    /// Sleep before retry `n` is `n * step`.
    pub step: Duration,
}

impl Default for PushRetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, step: Duration::from_millis(300) }
    }
}

impl PushRetryPolicy {
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PushOutcome {
    /// The current branch tracks nothing; push skipped.
    NoUpstream,
    Pushed { remote: String, branch: String, attempts: u32 },
}

/// Push the current branch to its upstream.
///
/// Rejections (non-fast-forward, ref lock, generic partial failure) trigger
/// a fetch and rebase before the next attempt. A failed fetch ends the
/// attempt with the original push error. The rebase outcome is not checked;
/// a failed rebase is aborted and the next push reports whatever happens.
pub fn push<B>(backend: &B, policy: &PushRetryPolicy) -> Result<PushOutcome, GitError>
where
    B: VcsBackend + ?Sized,
{
    let root = backend.repo_root();
    let upstream = backend.upstream()?;
    if !upstream.is_configured() {
        debug!(repo = %root.display(), "push: no upstream, skipping");
        return Ok(PushOutcome::NoUpstream);
    }
    let remote = upstream.upstream_remote.as_str();
    let branch = upstream.upstream_branch.as_str();

    let mut attempt = 1;
    loop {
        let error = match backend.push(remote, branch) {
            Ok(()) => {
                return Ok(PushOutcome::Pushed {
                    remote: remote.to_string(),
                    branch: branch.to_string(),
                    attempts: attempt,
                });
            }
            Err(error) => error,
        };

        if !error.kind().is_push_transient() || attempt >= policy.attempts {
            return Err(error);
        }

        warn!(
            repo = %root.display(),
            attempt,
            kind = %error.kind(),
            "push: rejected, fetching and rebasing"
        );

        if let Err(fetch_error) = backend.fetch(remote) {
            debug!(repo = %root.display(), error = %fetch_error, "push: fetch failed");
            return Err(error);
        }

        if let Err(rebase_error) = backend.rebase(&upstream.tracking_ref()) {
            debug!(repo = %root.display(), error = %rebase_error, "push: rebase failed");
            if let Err(abort_error) = backend.abort_rebase() {
                debug!(repo = %root.display(), error = %abort_error, "push: rebase abort failed");
            }
        }

        std::thread::sleep(policy.backoff_for(attempt));
        attempt += 1;
    }
}
