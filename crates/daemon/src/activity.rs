// Activity notifier: wakes the coordinator when the host resumes from sleep.

use std::time::{Duration, SystemTime};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

pub const WAKE_TICK: Duration = Duration::from_secs(10);
pub const WAKE_TOLERANCE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("activity notifier needs a running tokio runtime")]
    NoRuntime,
}

/// Pushes wake tokens onto the coordinator's trigger queue.
pub trait ActivityNotifier: Send + Sync {
    fn start(
        &self,
        wake: mpsc::Sender<bool>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ActivityError>;
}

/// Never signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ActivityNotifier for NoopNotifier {
    fn start(&self, _wake: mpsc::Sender<bool>, _shutdown: watch::Receiver<bool>) -> Result<(), ActivityError> {
        Ok(())
    }
}

/// Detects suspend/resume by watching for wall-clock jumps between ticks.
#[derive(Debug, Clone, Copy)]
pub struct SleepGapNotifier {
    tick: Duration,
    tolerance: Duration,
}

impl Default for SleepGapNotifier {
    fn default() -> Self {
        Self { tick: WAKE_TICK, tolerance: WAKE_TOLERANCE }
    }
}

impl SleepGapNotifier {
    pub fn new(tick: Duration, tolerance: Duration) -> Self {
        Self { tick, tolerance }
    }

    /// True when more wall-clock time passed than a tick can account for.
    pub fn is_wake_gap(&self, wall_elapsed: Duration) -> bool {
        wall_elapsed > self.tick + self.tolerance
    }
}

impl ActivityNotifier for SleepGapNotifier {
    fn start(
        &self,
        wake: mpsc::Sender<bool>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ActivityError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| ActivityError::NoRuntime)?;
        let notifier = *self;

        handle.spawn(async move {
            let mut ticker = tokio::time::interval(notifier.tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last = SystemTime::now();

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }
                if *shutdown.borrow() {
                    break;
                }

                let now = SystemTime::now();
                let elapsed = now.duration_since(last).unwrap_or(Duration::ZERO);
                last = now;

                if notifier.is_wake_gap(elapsed) {
                    info!(gap_secs = elapsed.as_secs(), "awake: resumed from sleep");
                    if wake.try_send(true).is_err() {
                        debug!("awake: trigger queue full or closed");
                    }
                }
                if wake.is_closed() {
                    break;
                }
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_must_exceed_tick_plus_tolerance() {
        let notifier = SleepGapNotifier::default();
        assert!(!notifier.is_wake_gap(Duration::from_secs(10)));
        assert!(!notifier.is_wake_gap(Duration::from_secs(40)));
        assert!(notifier.is_wake_gap(Duration::from_secs(41)));
        assert!(notifier.is_wake_gap(Duration::from_secs(3600)));
    }

    #[test]
    fn start_without_runtime_fails() {
        let (tx, _rx) = mpsc::channel(1);
        let (_stop, shutdown) = watch::channel(false);
        assert!(matches!(
            SleepGapNotifier::default().start(tx, shutdown),
            Err(ActivityError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn noop_never_signals() {
        let (tx, mut rx) = mpsc::channel(1);
        let (_stop, shutdown) = watch::channel(false);
        NoopNotifier.start(tx, shutdown).unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn sleep_gap_task_stops_on_shutdown() {
        let (tx, mut rx) = mpsc::channel(1);
        let (stop, shutdown) = watch::channel(false);
        SleepGapNotifier::new(Duration::from_millis(5), Duration::from_secs(30))
            .start(tx, shutdown)
            .unwrap();

        stop.send(true).unwrap();
        // The task drops its sender once it exits.
        let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert_eq!(closed.unwrap(), None);
    }
}
