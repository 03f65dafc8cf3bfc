// Remote URL classification.

/// Hosts whose git remotes authenticate through the `gh` CLI credential helper.
const GITHUB_HOST: &str = "github.com";

/// Credential helper configuration injected for GitHub remotes.
pub const GITHUB_CREDENTIAL_HELPER: &str =
    "credential.https://github.com.helper=!gh auth git-credential";

/// True for scp-style (`git@host:path`) and `ssh://` remotes.
pub fn is_ssh_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("git@") || url.starts_with("ssh://")
}

/// Web-hosted git providers the daemon knows how to authenticate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostingProvider {
    GitHub,
}

impl HostingProvider {
    /// Detect the provider from a remote URL.
    pub fn detect(url: &str) -> Option<Self> {
        if url.contains(GITHUB_HOST) {
            Some(Self::GitHub)
        } else {
            None
        }
    }

    /// `-c` value that routes authentication through an ambient helper.
    pub fn credential_helper(self) -> &'static str {
        match self {
            Self::GitHub => GITHUB_CREDENTIAL_HELPER,
        }
    }
}
