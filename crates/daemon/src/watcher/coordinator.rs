// Watch coordinator: merges filesystem events and a poll timer into
// serialized sync attempts for one repository.
//
//   FileWatcher ──► intake task ──(bounded, lossy)──► trigger loop ──► Syncer
//                   ignore filter                      poll ticker

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use autosync_common::change::ChangeEvent;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::backoff::EventBackoff;
use super::FileWatcher;
use crate::activity::{ActivityNotifier, NoopNotifier, SleepGapNotifier};
use crate::config::RepositoryConfig;
use crate::git::GitWorker;
use crate::ignore::{should_ignore, IgnoreError};
use crate::sync::{AutoSync, Syncer};

/// Depth of the trigger queue between intake and the trigger loop.
pub const TRIGGER_QUEUE_DEPTH: usize = 100;

/// Ignore predicate evaluated by the intake task, off the async threads.
pub type IgnoreCheck = Arc<dyn Fn(&Path) -> Result<bool, IgnoreError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub queue_depth: usize,
    pub backoff: EventBackoff,
}

impl CoordinatorSettings {
    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            settle_delay: config.settle_delay,
            queue_depth: TRIGGER_QUEUE_DEPTH,
            backoff: EventBackoff::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Startup,
    FsEvent,
    Poll,
}

pub struct Coordinator {
    repo: PathBuf,
    syncer: Arc<dyn Syncer>,
    ignore: IgnoreCheck,
    settings: CoordinatorSettings,
    notifier: Arc<dyn ActivityNotifier>,
}

impl Coordinator {
    pub fn new(
        repo: impl Into<PathBuf>,
        syncer: Arc<dyn Syncer>,
        ignore: IgnoreCheck,
        settings: CoordinatorSettings,
    ) -> Self {
        Self { repo: repo.into(), syncer, ignore, settings, notifier: Arc::new(NoopNotifier) }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ActivityNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sync once, then serve triggers until `shutdown` flips to true (or its
    /// sender goes away). An attempt already running is allowed to finish.
    pub async fn run(self, events: mpsc::Receiver<ChangeEvent>, mut shutdown: watch::Receiver<bool>) {
        info!(repo = %self.repo.display(), "watch: starting");

        self.attempt(Trigger::Startup).await;

        let (tx, rx) = mpsc::channel(self.settings.queue_depth.max(1));
        if let Err(error) = self.notifier.start(tx.clone(), shutdown.clone()) {
            warn!(repo = %self.repo.display(), %error, "awake: start error");
        }

        let intake = tokio::spawn(run_intake(
            self.repo.clone(),
            Arc::clone(&self.ignore),
            events,
            tx,
            shutdown.clone(),
        ));

        self.trigger_loop(rx, &mut shutdown).await;

        intake.abort();
        let _ = intake.await;
        info!(repo = %self.repo.display(), "watch: stopped");
    }

    async fn trigger_loop(&self, mut rx: mpsc::Receiver<bool>, shutdown: &mut watch::Receiver<bool>) {
        let poll = self.settings.poll_interval;
        let mut ticker = interval_at(Instant::now() + poll, poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut backoff = self.settings.backoff;
        let mut queue_open = true;

        loop {
            tokio::select! {
                _ = shutdown_requested(shutdown) => return,
                token = rx.recv(), if queue_open => {
                    if token.is_none() {
                        debug!(repo = %self.repo.display(), "watch: trigger queue closed, polling only");
                        queue_open = false;
                        continue;
                    }
                    if sleep_or_shutdown(self.settings.settle_delay, shutdown).await {
                        return;
                    }
                    // Everything queued during the settle delay is covered by this attempt.
                    while rx.try_recv().is_ok() {}

                    if self.attempt(Trigger::FsEvent).await {
                        backoff.on_success();
                    } else {
                        let penalty = backoff.on_failure();
                        debug!(
                            repo = %self.repo.display(),
                            penalty_ms = penalty.as_millis() as u64,
                            "autosync: backing off"
                        );
                        if sleep_or_shutdown(penalty, shutdown).await {
                            return;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.attempt(Trigger::Poll).await;
                }
            }
        }
    }

    /// Run one sync attempt on the blocking pool and log the outcome.
    async fn attempt(&self, trigger: Trigger) -> bool {
        let syncer = Arc::clone(&self.syncer);
        let outcome = tokio::task::spawn_blocking(move || syncer.sync()).await;
        let repo = self.repo.display();

        let error = match outcome {
            Ok(Ok(report)) => {
                match trigger {
                    Trigger::Startup => info!(repo = %repo, ?report, "autosync: startup success"),
                    Trigger::FsEvent => {
                        info!(repo = %repo, ?report, "autosync: fs-event success backoff-reset")
                    }
                    Trigger::Poll => info!(repo = %repo, ?report, "autosync: poll success"),
                }
                return true;
            }
            Ok(Err(error)) => error.to_string(),
            Err(join_error) => format!("sync task panicked: {join_error}"),
        };

        match trigger {
            Trigger::Startup => warn!(repo = %repo, %error, "watch: initial autosync error"),
            Trigger::FsEvent => warn!(repo = %repo, %error, "autosync: fs-event failed"),
            Trigger::Poll => warn!(repo = %repo, %error, "autosync: poll failed"),
        }
        false
    }
}

/// Filter raw events and turn survivors into trigger tokens. Never blocks on
/// a full queue; the token is dropped instead.
pub(crate) async fn run_intake(
    repo: PathBuf,
    ignore: IgnoreCheck,
    mut events: mpsc::Receiver<ChangeEvent>,
    tx: mpsc::Sender<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => return,
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    debug!(repo = %repo.display(), "watch: event source closed");
                    return;
                }
            },
        };

        let check = Arc::clone(&ignore);
        let path = event.path.clone();
        match tokio::task::spawn_blocking(move || check(&path)).await {
            Ok(Ok(true)) => continue,
            Ok(Ok(false)) => {}
            Ok(Err(error)) => {
                warn!(repo = %repo.display(), path = %event.path.display(), %error, "watch: ignore-check error");
                continue;
            }
            Err(join_error) => {
                warn!(repo = %repo.display(), error = %join_error, "watch: ignore-check panicked");
                continue;
            }
        }

        debug!(repo = %repo.display(), op = %event.kind, path = %event.path.display(), "watch: event");
        match tx.try_send(true) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(repo = %repo.display(), path = %event.path.display(), "watch: filtered-channel-full");
            }
            Err(TrySendError::Closed(_)) => return,
        }
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Sleep for `delay`; true if shutdown arrived first.
async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = shutdown_requested(shutdown) => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

/// Watch one repository until `shutdown`: start the file watcher, wire the
/// ignore filter and sync pipeline to it, and run the coordinator.
///
/// Fails only when the watcher cannot be started.
pub async fn watch_repository(config: RepositoryConfig, shutdown: watch::Receiver<bool>) -> Result<()> {
    let (watcher, events) = FileWatcher::start(&config.root)
        .with_context(|| format!("cannot watch repository {}", config.root.display()))?;

    let worker = Arc::new(GitWorker::from_config(&config));
    let ignore: IgnoreCheck = {
        let worker = Arc::clone(&worker);
        let root = watcher.root().to_path_buf();
        Arc::new(move |path: &Path| should_ignore(worker.as_ref(), &root, path))
    };
    let syncer: Arc<dyn Syncer> = Arc::new(AutoSync::new(worker));

    Coordinator::new(watcher.root(), syncer, ignore, CoordinatorSettings::from_config(&config))
        .with_notifier(Arc::new(SleepGapNotifier::default()))
        .run(events, shutdown)
        .await;

    drop(watcher);
    Ok(())
}
