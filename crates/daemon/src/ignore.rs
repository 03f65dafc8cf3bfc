// Ignore filter: decides whether a changed path should stay out of commits.
//
// Evaluated fresh on every call; `.gitignore` edits take effect on the next
// sync attempt.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::git::{GitError, VcsBackend};

const METADATA_DIR: &str = ".git";

#[derive(Debug, Error)]
pub enum IgnoreError {
    #[error("could not stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ignore matcher failed: {0}")]
    Matcher(#[from] GitError),
}

/// Editor swap and backup files: `*.swp`, `~*`, `*~`.
pub fn is_editor_temp_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".swp") || name.starts_with('~') || name.ends_with('~')
}

/// True for the metadata directory itself and anything beneath it.
pub fn is_metadata_path(relative: &Path) -> bool {
    matches!(
        relative.components().next(),
        Some(Component::Normal(first)) if first == METADATA_DIR
    )
}

/// Whether `path` should be left out of commits.
///
/// Relative paths are taken relative to `repo_root`. Rules, first match wins:
/// editor temp file, inside `.git`, outside the repository, then the
/// repository's ignore patterns. Zero-length files are not ignored.
pub fn should_ignore<B>(backend: &B, repo_root: &Path, path: &Path) -> Result<bool, IgnoreError>
where
    B: VcsBackend + ?Sized,
{
    let absolute = if path.is_absolute() { path.to_path_buf() } else { repo_root.join(path) };

    if is_editor_temp_file(&absolute) {
        return Ok(true);
    }

    let Ok(relative) = absolute.strip_prefix(repo_root) else {
        return Ok(true);
    };
    if relative.as_os_str().is_empty() || is_metadata_path(relative) {
        return Ok(true);
    }

    // A vanished path is still a change worth evaluating (deletions).
    match std::fs::symlink_metadata(&absolute) {
        Ok(_) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(IgnoreError::Stat { path: absolute, source }),
    }

    Ok(backend.is_ignored(relative)?)
}
