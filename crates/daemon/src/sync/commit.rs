// Commit pipeline: stage, filter ignored paths, build the message, commit.

use std::path::Path;

use autosync_common::staged::StagedChange;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::git::{GitError, VcsBackend};
use crate::ignore::{should_ignore, IgnoreError};

#[derive(Debug, Error)]
pub enum CommitError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Ignore(#[from] IgnoreError),
}

/// What one commit attempt did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// Nothing was staged after `add -A`.
    Clean,
    /// Every staged path was ignored; the index was reset.
    IgnoredOnly { unstaged: usize },
    Committed { changes: Vec<StagedChange> },
}

/// Commit message body: one `STATUS PATH` line per change, ordered by path
/// and then status so the same set of changes always yields the same text.
pub fn build_message(changes: &[StagedChange]) -> String {
    let mut sorted: Vec<&StagedChange> = changes.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.status.cmp(&b.status)));
    sorted.iter().map(|change| change.to_string()).collect::<Vec<_>>().join("\n")
}

/// Stage every change and commit whatever survives the ignore filter.
///
/// Ignored paths are unstaged before committing. Staging is not rolled back
/// when a later step fails; the next attempt re-stages.
pub fn commit<B>(backend: &B) -> Result<CommitOutcome, CommitError>
where
    B: VcsBackend + ?Sized,
{
    let root = backend.repo_root();

    backend.stage_all()?;
    if !backend.has_staged_changes()? {
        return Ok(CommitOutcome::Clean);
    }

    let staged = backend.staged_changes()?;
    let mut kept = Vec::with_capacity(staged.len());
    let mut ignored = Vec::new();
    for change in staged {
        if should_ignore(backend, root, Path::new(&change.path))? {
            ignored.push(change.path);
        } else {
            kept.push(change);
        }
    }

    if kept.is_empty() {
        debug!(repo = %root.display(), count = ignored.len(), "commit: only ignored paths staged");
        backend.unstage_all()?;
        return Ok(CommitOutcome::IgnoredOnly { unstaged: ignored.len() });
    }

    if !ignored.is_empty() {
        debug!(repo = %root.display(), count = ignored.len(), "commit: unstaging ignored paths");
        backend.unstage_paths(&ignored)?;
    }

    let message = build_message(&kept);
    backend.commit(&message)?;
    debug!(repo = %root.display(), files = kept.len(), "commit: created");

    kept.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.status.cmp(&b.status)));
    Ok(CommitOutcome::Committed { changes: kept })
}
