//! Periodic driver for ingestion cycles.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::pipeline::{CycleOutcome, IngestPipeline};
use crate::TARGET_SCHEDULER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Runs one ingestion cycle immediately, then one per interval. Exactly
/// one cycle is in flight at a time; ticks that land while a cycle is
/// still running are skipped, not queued.
pub struct Scheduler {
    pipeline: Arc<IngestPipeline>,
    interval: Duration,
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<IngestPipeline>, interval: Duration) -> Self {
        Scheduler {
            pipeline,
            interval,
            state: Mutex::new(SchedulerState::Idle),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: SchedulerState) {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    /// Drive cycles until the cancellation signal fires. The first tick
    /// fires immediately; missed ticks during an overrunning cycle are
    /// coalesced.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(target: TARGET_SCHEDULER, "Scheduler started with interval {:?}", self.interval);

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    // A dropped sender counts as cancellation.
                    if changed.is_err() || *cancel.borrow() {
                        info!(target: TARGET_SCHEDULER, "Cancellation received, stopping scheduler");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if *cancel.borrow() {
                        info!(target: TARGET_SCHEDULER, "Cancellation received, skipping tick");
                        break;
                    }
                    self.execute_cycle(cancel.clone()).await;
                }
            }
        }

        info!(target: TARGET_SCHEDULER, "Scheduler stopped");
    }

    async fn execute_cycle(&self, cancel: watch::Receiver<bool>) {
        self.set_state(SchedulerState::Running);

        match self.pipeline.run_cycle(cancel).await {
            Ok(CycleOutcome::Completed { fetch, link }) => {
                info!(
                    target: TARGET_SCHEDULER,
                    "Cycle complete: {} new articles, {} skipped, {} mention relations",
                    fetch.new_total(),
                    fetch.skipped_total(),
                    link.relations_written
                );
            }
            Ok(CycleOutcome::Skipped) => {
                info!(target: TARGET_SCHEDULER, "Cycle skipped, previous cycle still in flight");
            }
            Err(err) => {
                // Storage failures surface here; the next tick retries.
                error!(target: TARGET_SCHEDULER, "Cycle failed: {}", err);
            }
        }

        self.set_state(SchedulerState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::rss::FetchConfig;

    #[tokio::test]
    async fn scheduler_runs_immediately_and_stops_on_cancel() {
        let db = Database::new_in_memory().await.unwrap();
        let pipeline = Arc::new(IngestPipeline::new(db.clone(), FetchConfig::default()));
        let scheduler = Arc::new(Scheduler::new(pipeline, Duration::from_secs(3600)));

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run(cancel_rx).await })
        };

        // The immediate first cycle runs with no sources and returns to idle.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        cancel_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop after cancellation")
            .unwrap();
    }
}
