//! Refresh passes: on a timer, on demand, and never two at once.

use crate::aggregator::Aggregator;
use crate::outputs::json::write_snapshot;
use crate::snapshot::{PublishOutcome, SnapshotStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

/// Clears the running flag when a refresh ends, however it ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs a pass, publishes it, and persists what was published.
#[derive(Debug)]
pub struct Refresher {
    aggregator: Arc<Aggregator>,
    store: Arc<SnapshotStore>,
    data_file: Option<PathBuf>,
    running: Arc<AtomicBool>,
}

impl Refresher {
    /// Create a refresher.
    ///
    /// # Arguments
    ///
    /// * `aggregator` - Runs the passes
    /// * `store` - Receives every non-empty snapshot
    /// * `data_file` - Where published snapshots are persisted; `None` keeps
    ///   them in memory only
    pub fn new(
        aggregator: Arc<Aggregator>,
        store: Arc<SnapshotStore>,
        data_file: Option<PathBuf>,
    ) -> Self {
        Self {
            aggregator,
            store,
            data_file,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn is_refreshing(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<RunningGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard(Arc::clone(&self.running)))
    }

    /// Run one pass now. Returns `None` if another pass is already running.
    pub async fn refresh(&self) -> Option<PublishOutcome> {
        let _guard = self.try_begin()?;
        Some(self.run_and_publish().await)
    }

    /// Start a pass in the background and return immediately.
    ///
    /// Returns `false` when a pass is already running; the request is then
    /// folded into that pass.
    pub fn trigger(self: &Arc<Self>) -> bool {
        let Some(guard) = self.try_begin() else {
            info!("Refresh already running; trigger coalesced");
            return false;
        };
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            this.run_and_publish().await;
        });
        true
    }

    #[instrument(level = "info", skip_all)]
    async fn run_and_publish(&self) -> PublishOutcome {
        let snapshot = self.aggregator.run_pass().await;
        let outcome = self.store.publish(snapshot);

        if outcome == PublishOutcome::Published {
            if let Some(path) = &self.data_file {
                let current = self.store.current();
                if let Err(e) = write_snapshot(&current, path).await {
                    error!(path = %path.display(), error = %e, "Failed to persist snapshot");
                }
            }
        }
        outcome
    }
}

/// Refresh immediately, then every `every`.
///
/// Ticks that arrive while a pass is still running are skipped, whether that
/// pass came from an earlier tick or from [`Refresher::trigger`].
///
/// # Arguments
///
/// * `refresher` - Shared with the HTTP layer so manual triggers coalesce
/// * `every` - Interval between ticks
///
/// # Returns
///
/// The handle of the spawned loop; it runs until aborted.
pub fn spawn_scheduler(refresher: Arc<Refresher>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match refresher.refresh().await {
                Some(outcome) => info!(?outcome, "Scheduled refresh finished"),
                None => info!("Scheduled refresh skipped; previous pass still running"),
            }
        }
    })
}
