// Version-control primitives the sync pipelines are written against.

use std::path::Path;

use autosync_common::branch::BranchInfo;
use autosync_common::staged::StagedChange;

use super::error::GitError;

/// The operations one sync attempt needs from the version-control tool.
///
/// `GitWorker` is the deployed implementation; every primitive shells out
/// to `git`. Tests substitute scripted backends.
pub trait VcsBackend: Send + Sync {
    /// Root of the working tree.
    fn repo_root(&self) -> &Path;

    /// Forget state cached from the previous attempt (such as the remote URL).
    fn refresh(&self) {}

    /// Stage additions, modifications, deletions, and renames in one step.
    fn stage_all(&self) -> Result<(), GitError>;

    fn has_staged_changes(&self) -> Result<bool, GitError>;

    /// Staged entries in the order git reports them.
    fn staged_changes(&self) -> Result<Vec<StagedChange>, GitError>;

    fn unstage_all(&self) -> Result<(), GitError>;

    fn unstage_paths(&self, paths: &[String]) -> Result<(), GitError>;

    fn commit(&self, message: &str) -> Result<(), GitError>;

    /// Upstream of the current branch, resolved fresh on every call.
    /// Empty when the branch tracks nothing (or HEAD is detached).
    fn upstream(&self) -> Result<BranchInfo, GitError>;

    fn fetch(&self, remote: &str) -> Result<(), GitError>;

    fn rebase(&self, onto: &str) -> Result<(), GitError>;

    fn abort_rebase(&self) -> Result<(), GitError>;

    fn push(&self, remote: &str, branch: &str) -> Result<(), GitError>;

    /// Whether the repository's ignore patterns match `relative`.
    fn is_ignored(&self, relative: &Path) -> Result<bool, GitError>;
}

impl<B: VcsBackend + ?Sized> VcsBackend for std::sync::Arc<B> {
    fn repo_root(&self) -> &Path {
        (**self).repo_root()
    }

    fn refresh(&self) {
        (**self).refresh()
    }

    fn stage_all(&self) -> Result<(), GitError> {
        (**self).stage_all()
    }

    fn has_staged_changes(&self) -> Result<bool, GitError> {
        (**self).has_staged_changes()
    }

    fn staged_changes(&self) -> Result<Vec<StagedChange>, GitError> {
        (**self).staged_changes()
    }

    fn unstage_all(&self) -> Result<(), GitError> {
        (**self).unstage_all()
    }

    fn unstage_paths(&self, paths: &[String]) -> Result<(), GitError> {
        (**self).unstage_paths(paths)
    }

    fn commit(&self, message: &str) -> Result<(), GitError> {
        (**self).commit(message)
    }

    fn upstream(&self) -> Result<BranchInfo, GitError> {
        (**self).upstream()
    }

    fn fetch(&self, remote: &str) -> Result<(), GitError> {
        (**self).fetch(remote)
    }

    fn rebase(&self, onto: &str) -> Result<(), GitError> {
        (**self).rebase(onto)
    }

    fn abort_rebase(&self) -> Result<(), GitError> {
        (**self).abort_rebase()
    }

    fn push(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        (**self).push(remote, branch)
    }

    fn is_ignored(&self, relative: &Path) -> Result<bool, GitError> {
        (**self).is_ignored(relative)
    }
}
