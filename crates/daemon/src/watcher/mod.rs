// File watcher: inotify/fsevents → ChangeEvent stream for the coordinator.

pub mod backoff;
pub mod coordinator;

pub use backoff::EventBackoff;
pub use coordinator::{watch_repository, Coordinator, CoordinatorSettings, IgnoreCheck};

use anyhow::{Context, Result};
use autosync_common::change::{ChangeEvent, ChangeKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

/// Capacity for the raw event channel.
const EVENT_CHANNEL_CAPACITY: usize = 512;

/// Watches a working tree recursively using the OS-native file watcher.
///
/// Events are sent to the returned receiver until the watcher is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `root` recursively.
    pub fn start(root: &Path) -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        let root = root
            .canonicalize()
            .with_context(|| format!("failed to canonicalize watch root: {}", root.display()))?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let root_for_filter = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in translate_event(&event, &root_for_filter) {
                    if tx.blocking_send(change).is_err() {
                        debug!("event channel closed, stopping event dispatch");
                        return;
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "file watcher error");
            }
        })
        .context("failed to create file watcher")?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch directory: {}", root.display()))?;

        debug!(path = %root.display(), "file watcher started");

        Ok((Self { _watcher: watcher, root }, rx))
    }

    /// The canonicalized root directory being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_inside_root(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Map a `notify::Event` to zero or more `ChangeEvent`s under `root`.
fn translate_event(event: &Event, root: &Path) -> Vec<ChangeEvent> {
    use notify::event::ModifyKind;

    let kind = match &event.kind {
        EventKind::Create(_) => ChangeKind::Create,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Rename,
        EventKind::Modify(ModifyKind::Metadata(_)) => {
            trace!("skipping metadata-only modify event");
            return Vec::new();
        }
        EventKind::Modify(_) => ChangeKind::Write,
        EventKind::Remove(_) => ChangeKind::Remove,
        _ => {
            trace!(kind = ?event.kind, "skipping non-content event");
            return Vec::new();
        }
    };

    event
        .paths
        .iter()
        .filter(|p| {
            if is_inside_root(p, root) {
                true
            } else {
                warn!(path = %p.display(), "ignoring event outside watch root");
                false
            }
        })
        .map(|p| ChangeEvent::new(p.clone(), kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{
        AccessKind, CreateKind, DataChange, MetadataKind, ModifyKind, RemoveKind, RenameMode,
    };
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::{timeout, Duration};

    fn make_event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
        Event { kind, paths, attrs: Default::default() }
    }

    #[test]
    fn maps_event_kinds() {
        let root = PathBuf::from("/repo");
        let path = vec![PathBuf::from("/repo/notes/today.md")];
        let cases = [
            (EventKind::Create(CreateKind::File), ChangeKind::Create),
            (EventKind::Modify(ModifyKind::Data(DataChange::Content)), ChangeKind::Write),
            (EventKind::Modify(ModifyKind::Any), ChangeKind::Write),
            (EventKind::Modify(ModifyKind::Name(RenameMode::To)), ChangeKind::Rename),
            (EventKind::Remove(RemoveKind::File), ChangeKind::Remove),
        ];
        for (kind, expected) in cases {
            let changes = translate_event(&make_event(kind, path.clone()), &root);
            assert_eq!(changes, vec![ChangeEvent::new("/repo/notes/today.md", expected)]);
        }
    }

    #[test]
    fn any_file_type_passes() {
        let root = PathBuf::from("/repo");
        let event = make_event(
            EventKind::Create(CreateKind::File),
            vec![PathBuf::from("/repo/image.png"), PathBuf::from("/repo/src/main.rs")],
        );
        assert_eq!(translate_event(&event, &root).len(), 2);
    }

    #[test]
    fn rename_with_both_paths_reports_both() {
        let root = PathBuf::from("/repo");
        let event = make_event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec![PathBuf::from("/repo/old.txt"), PathBuf::from("/repo/new.txt")],
        );
        let changes = translate_event(&event, &root);
        assert_eq!(
            changes,
            vec![
                ChangeEvent::new("/repo/old.txt", ChangeKind::Rename),
                ChangeEvent::new("/repo/new.txt", ChangeKind::Rename),
            ]
        );
    }

    #[test]
    fn skips_metadata_and_access_events() {
        let root = PathBuf::from("/repo");
        let path = vec![PathBuf::from("/repo/a.txt")];
        let metadata = make_event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            path.clone(),
        );
        let access = make_event(EventKind::Access(AccessKind::Any), path);
        assert!(translate_event(&metadata, &root).is_empty());
        assert!(translate_event(&access, &root).is_empty());
    }

    #[test]
    fn rejects_outside_root() {
        let root = PathBuf::from("/repo");
        let event =
            make_event(EventKind::Create(CreateKind::File), vec![PathBuf::from("/repository/x")]);
        assert!(translate_event(&event, &root).is_empty());
    }

    #[tokio::test]
    async fn watcher_detects_create_in_subdirectory() {
        let tmp = TempDir::new().unwrap();
        let subdir = tmp.path().join("nested").join("deep");
        fs::create_dir_all(&subdir).unwrap();

        let (watcher, mut rx) = FileWatcher::start(tmp.path()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(subdir.join("nested.txt"), "hello").unwrap();

        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed");
        assert!(event.path.ends_with("nested.txt"));

        drop(watcher);
    }

    #[tokio::test]
    async fn watcher_detects_delete() {
        let tmp = TempDir::new().unwrap();
        let file_path = tmp.path().join("to_delete.txt");
        fs::write(&file_path, "bye").unwrap();

        let (watcher, mut rx) = FileWatcher::start(tmp.path()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::remove_file(&file_path).unwrap();

        // Some backends emit synthetic events for pre-existing files first.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let mut found_remove = false;
        while tokio::time::Instant::now() < deadline {
            match timeout(Duration::from_secs(2), rx.recv()).await {
                Ok(Some(event)) if event.kind == ChangeKind::Remove => {
                    assert!(event.path.ends_with("to_delete.txt"));
                    found_remove = true;
                    break;
                }
                Ok(Some(_)) => continue,
                _ => break,
            }
        }
        assert!(found_remove, "expected a Remove event for to_delete.txt");

        drop(watcher);
    }

    #[test]
    fn watcher_rejects_nonexistent_root() {
        assert!(FileWatcher::start(Path::new("/nonexistent/path/abc123")).is_err());
    }

    #[test]
    fn watcher_exposes_canonical_root() {
        let tmp = TempDir::new().unwrap();
        let (watcher, _rx) = FileWatcher::start(tmp.path()).unwrap();
        assert_eq!(watcher.root(), tmp.path().canonicalize().unwrap());
    }
}
