// Upstream tracking information for the current branch.

use serde::{Deserialize, Serialize};

const HEADS_PREFIX: &str = "refs/heads/";

/// The remote and branch the current local branch pushes to.
///
/// Re-derived on every push attempt; the mapping can change between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub upstream_remote: String,
    pub upstream_branch: String,
}

impl BranchInfo {
    /// Build from the raw `branch.<name>.remote` and `branch.<name>.merge`
    /// values. The merge ref is shortened to a branch name.
    pub fn from_tracking(remote: &str, merge_ref: &str) -> Self {
        let remote = remote.trim();
        let merge_ref = merge_ref.trim();
        let branch = merge_ref.strip_prefix(HEADS_PREFIX).unwrap_or(merge_ref);
        Self { upstream_remote: remote.to_string(), upstream_branch: branch.to_string() }
    }

    /// True when both halves are present and the remote is not the local
    /// repository (`.`).
    pub fn is_configured(&self) -> bool {
        !self.upstream_remote.is_empty()
            && !self.upstream_branch.is_empty()
            && self.upstream_remote != "."
    }

    /// `<remote>/<branch>`, the remote-tracking ref to rebase onto.
    pub fn tracking_ref(&self) -> String {
        format!("{}/{}", self.upstream_remote, self.upstream_branch)
    }
}
