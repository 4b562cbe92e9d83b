//! Background reconciliation of pending view deltas.
//!
//! On a fixed interval the reconciler snapshots every `post_views:*` delta,
//! adds each one to `posts.views` with a relative `UPDATE`, and only after
//! that write commits removes the flushed amount from the ephemeral store.
//!
//! ## Delivery
//!
//! Views are delivered **at least once**. If the process dies (or the store
//! drops out) between the durable write and the settle, the same delta is
//! applied again on the next cycle. The error is bounded by one extra copy
//! of the delta per failed settle; views are never silently lost.
//!
//! Only one cycle runs at a time. A trigger that arrives while a cycle is in
//! flight is skipped, not queued.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    ephemeral::StoreResult,
    models::CounterDelta,
    repos::ViewCountRepo,
    stores::ViewCounterCache,
};

/// Interval used when none (or zero) is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    Idle,
    Running,
}

/// Tally of one reconciliation cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Deltas written to the database and cleared from the store.
    pub flushed: usize,
    /// Deltas dropped because their post no longer exists.
    pub discarded: usize,
    /// Deltas whose durable write failed; left pending for the next cycle.
    pub failed: usize,
    /// Deltas written but not cleared; they will be applied again.
    pub unsettled: usize,
    /// Keys holding a zero delta, cleaned up without a write.
    pub skipped_zero: usize,
    /// Shutdown was requested before every delta was processed.
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was already running.
    Skipped,
}

pub struct Reconciler {
    views: ViewCounterCache,
    repo: Arc<dyn ViewCountRepo>,
    durable_timeout: Duration,
    running: Mutex<()>,
    busy: AtomicBool,
}

/// Clears the busy flag even if the cycle future is dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Reconciler {
    pub fn new(
        views: ViewCounterCache,
        repo: Arc<dyn ViewCountRepo>,
        durable_timeout: Duration,
    ) -> Self {
        Self {
            views,
            repo,
            durable_timeout,
            running: Mutex::new(()),
            busy: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ReconcilerState {
        if self.busy.load(Ordering::Acquire) {
            ReconcilerState::Running
        } else {
            ReconcilerState::Idle
        }
    }

    /// Run one cycle now.
    ///
    /// Fails only when the pending deltas cannot be enumerated; per-entity
    /// failures are counted in the report. `shutdown` is checked before each
    /// entity, never in the middle of a durable write.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> StoreResult<CycleOutcome> {
        let Ok(_lock) = self.running.try_lock() else {
            tracing::debug!("reconciliation already running, skipping trigger");
            return Ok(CycleOutcome::Skipped);
        };

        self.busy.store(true, Ordering::Release);
        let _busy = BusyGuard(&self.busy);

        let report = self.reconcile(shutdown).await?;
        Ok(CycleOutcome::Completed(report))
    }

    async fn reconcile(&self, shutdown: &watch::Receiver<bool>) -> StoreResult<CycleReport> {
        let deltas = self.views.drain_all().await?;
        let mut report = CycleReport::default();

        for delta in deltas {
            if *shutdown.borrow() {
                report.interrupted = true;
                break;
            }

            if delta.delta == 0 {
                self.settle(&delta, &mut report).await;
                report.skipped_zero += 1;
                continue;
            }

            let write = time::timeout(
                self.durable_timeout,
                self.repo.increment_views(delta.entity_id, delta.delta),
            )
            .await;

            match write {
                Ok(Ok(true)) => report.flushed += 1,
                Ok(Ok(false)) => {
                    tracing::warn!(
                        entity_id = %delta.entity_id,
                        delta = delta.delta,
                        "post no longer exists, discarding pending views"
                    );
                    report.discarded += 1;
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        error = %e,
                        delta = delta.delta,
                        "view flush failed, will retry"
                    );
                    report.failed += 1;
                    continue;
                }
                Err(_) => {
                    tracing::warn!(
                        entity_id = %delta.entity_id,
                        delta = delta.delta,
                        timeout_ms = self.durable_timeout.as_millis() as u64,
                        "view flush timed out, will retry"
                    );
                    report.failed += 1;
                    continue;
                }
            }

            self.settle(&delta, &mut report).await;
        }

        tracing::info!(
            flushed = report.flushed,
            discarded = report.discarded,
            failed = report.failed,
            unsettled = report.unsettled,
            skipped_zero = report.skipped_zero,
            interrupted = report.interrupted,
            "reconciliation cycle finished"
        );

        Ok(report)
    }

    async fn settle(&self, delta: &CounterDelta, report: &mut CycleReport) {
        if let Err(e) = self.views.settle(delta).await {
            tracing::warn!(
                entity_id = %delta.entity_id,
                delta = delta.delta,
                error = %e,
                "flushed delta not cleared, it will be applied again"
            );
            report.unsettled += 1;
        }
    }

    /// Run a cycle every `interval`, the first one `interval` after start.
    ///
    /// Dropping the returned handle also stops the task once the current
    /// cycle finishes.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> ReconcilerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(interval_secs = interval.as_secs(), "reconciler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }

                if *shutdown_rx.borrow() {
                    break;
                }

                if let Err(e) = self.run_cycle(&shutdown_rx).await {
                    tracing::warn!(error = %e, "reconciliation cycle aborted, deltas stay pending");
                }
            }

            tracing::info!("reconciler stopped");
        });

        ReconcilerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Owner of a spawned reconciler task.
pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Stop after the entity currently being flushed and wait for the task.
    pub async fn shutdown(self) {
        // Err means the task is already gone
        let _ = self.shutdown.send(true);

        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "reconciler task panicked");
        }
    }
}
