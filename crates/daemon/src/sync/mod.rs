// One sync attempt: commit pipeline, then push pipeline.

pub mod commit;
pub mod push;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

pub use commit::{build_message, CommitError, CommitOutcome};
pub use push::{PushOutcome, PushRetryPolicy};

use crate::config::RepositoryConfig;
use crate::git::{GitError, GitWorker, VcsBackend};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("commit failed: {0}")]
    Commit(#[from] CommitError),

    #[error("push failed: {0}")]
    Push(#[source] GitError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub commit: CommitOutcome,
    pub push: PushOutcome,
}

/// Something the coordinator can ask to run one blocking sync attempt.
pub trait Syncer: Send + Sync + 'static {
    fn sync(&self) -> Result<SyncReport, SyncError>;
}

/// Commit then push, against one repository.
pub struct AutoSync<B> {
    backend: B,
    push_policy: PushRetryPolicy,
}

impl AutoSync<GitWorker> {
    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self::new(GitWorker::from_config(config))
    }
}

impl<B: VcsBackend> AutoSync<B> {
    pub fn new(backend: B) -> Self {
        Self { backend, push_policy: PushRetryPolicy::default() }
    }

    pub fn with_push_policy(mut self, policy: PushRetryPolicy) -> Self {
        self.push_policy = policy;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run one attempt. A commit failure skips the push.
    pub fn run_once(&self) -> Result<SyncReport, SyncError> {
        self.backend.refresh();
        let commit = commit::commit(&self.backend)?;
        let push = push::push(&self.backend, &self.push_policy).map_err(SyncError::Push)?;
        Ok(SyncReport { commit, push })
    }
}

impl<B: VcsBackend + 'static> Syncer for AutoSync<B> {
    fn sync(&self) -> Result<SyncReport, SyncError> {
        self.run_once()
    }
}

impl<S: Syncer + ?Sized> Syncer for Arc<S> {
    fn sync(&self) -> Result<SyncReport, SyncError> {
        (**self).sync()
    }
}
