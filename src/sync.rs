//! Reconciliation of pool population against its bounds and demand.
//!
//! A pass retires aged idle resources, creates enough new ones to cover
//! queued borrows (clamped to `[min_resources, max_resources]`) and rejects
//! queued borrows beyond `max_outstanding_borrows`. At most one pass runs at
//! a time; triggers that arrive mid-pass schedule one follow-up pass.

use crate::errors::{CancelReason, PoolError};
use crate::eviction;
use crate::manager::Manage;
use crate::metrics::MetricsTracker;
use crate::pool::{Entry, Shared};

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

/// Coalescing flags for the sync loop plus the periodic ticker handle
pub(crate) struct SyncControl {
    running: AtomicBool,
    rerun: AtomicBool,
    finished: Notify,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Default)]
struct PassReport {
    expired: usize,
    created: usize,
    failed: usize,
    rejected: usize,
}

impl SyncControl {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
            finished: Notify::new(),
            ticker: Mutex::new(None),
        }
    }

    /// True if the caller now owns the sync loop and must run it.
    ///
    /// `rerun` is raised before `running` is tested, so a loop that is on
    /// its way out either sees the request or has already let go of
    /// `running` and this caller takes over.
    fn claim(&self) -> bool {
        self.rerun.store(true, Ordering::SeqCst);
        !self.running.swap(true, Ordering::SeqCst)
    }

    /// Give up ownership of the loop. True if a trigger arrived meanwhile
    /// and the caller took ownership back.
    fn release(&self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        self.rerun.load(Ordering::SeqCst) && !self.running.swap(true, Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait until no sync loop is in flight
    pub async fn wait_idle(&self) {
        loop {
            let finished = self.finished.notified();
            tokio::pin!(finished);
            finished.as_mut().enable();
            if !self.is_running() {
                return;
            }
            finished.await;
        }
    }

    pub fn start_ticker<M: Manage>(shared: &Arc<Shared<M>>, every: Duration) {
        let weak = Arc::downgrade(shared);
        let handle = shared.runtime.spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; construction already schedules a pass.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                shared.trigger_sync();
            }
        });
        *shared.syncer.ticker.lock() = Some(handle);
    }

    pub fn stop_ticker(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }
}

impl<M: Manage> Shared<M> {
    /// Start a sync loop, or ask the running one to go around again
    pub fn trigger_sync(self: &Arc<Self>) {
        if !self.syncer.claim() {
            trace!("sync in flight; follow-up scheduled");
            return;
        }
        let shared = Arc::clone(self);
        self.runtime.spawn(async move { shared.run_sync_loop().await });
    }

    async fn run_sync_loop(self: Arc<Self>) {
        let syncer = &self.syncer;
        loop {
            syncer.rerun.store(false, Ordering::SeqCst);
            let report = self.sync_pass().await;
            if syncer.rerun.swap(false, Ordering::SeqCst) || self.needs_followup(&report) {
                continue;
            }
            if syncer.release() {
                continue;
            }
            syncer.finished.notify_waiters();
            return;
        }
    }

    /// Demand is still unmet and there is room to meet it. A pass whose
    /// creations failed does not loop; the next trigger retries.
    fn needs_followup(&self, report: &PassReport) -> bool {
        if report.failed > 0 {
            return false;
        }
        let state = self.state.lock();
        !state.is_destroying()
            && !state.waiting.is_empty()
            && state.known.len() < self.config.max_resources
    }

    async fn sync_pass(self: &Arc<Self>) -> PassReport {
        let mut report = PassReport::default();
        let max_age = self.config.resource_max_age;

        let (expired, deficit, rejected) = {
            let mut state = self.state.lock();
            if state.is_destroying() {
                return report;
            }

            let mut expired = Vec::new();
            if max_age.is_some() {
                let (stale, fresh): (VecDeque<Entry<M::Resource>>, VecDeque<Entry<M::Resource>>) =
                    state
                        .idle
                        .drain(..)
                        .partition(|entry| eviction::is_expired(entry.created_at, max_age));
                state.idle = fresh;
                for entry in stale {
                    state.known.remove(&entry.id);
                    expired.push(entry.resource);
                }
            }

            let size = state.known.len();
            let target = (size + state.waiting.len())
                .clamp(self.config.min_resources, self.config.max_resources);
            let deficit = target.saturating_sub(size);

            let mut rejected = Vec::new();
            if let Some(limit) = self.config.max_outstanding_borrows {
                while state.waiting.len() > limit {
                    match state.waiting.pop_back() {
                        Some(request) => rejected.push(request),
                        None => break,
                    }
                }
            }

            (expired, deficit, rejected)
        };

        report.expired = expired.len();
        report.rejected = rejected.len();
        for _ in 0..report.expired {
            MetricsTracker::incr(&self.metrics.resources_expired);
        }

        for request in rejected {
            let _ = request
                .deferred
                .settle(Err(PoolError::MaxOutstandingBorrowsExceeded));
            MetricsTracker::incr(&self.metrics.queue_rejections);
            self.hooks
                .on_request_cancelled(CancelReason::MaxQueuedRequestsExceeded);
            self.hooks.on_request_dequeued();
        }

        let mut creations: FuturesUnordered<_> =
            (0..deficit).map(|_| self.manager.create()).collect();

        // Each resource goes to the oldest waiter as soon as it exists.
        let create_all = async {
            let mut orphans = Vec::new();
            let mut created = 0;
            let mut failed = 0;
            while let Some(result) = creations.next().await {
                match result {
                    Ok(resource) => {
                        created += 1;
                        MetricsTracker::incr(&self.metrics.resources_created);
                        if let Some(orphan) = self.register(resource) {
                            orphans.push(orphan);
                        }
                    }
                    Err(err) => {
                        failed += 1;
                        MetricsTracker::incr(&self.metrics.creation_failures);
                        warn!(error = %err, "resource creation failed");
                    }
                }
            }
            (created, failed, orphans)
        };
        let dispose_expired = join_all(expired.into_iter().map(|resource| self.dispose(resource)));

        let ((created, failed, orphans), _) = futures::join!(create_all, dispose_expired);
        report.created = created;
        report.failed = failed;

        // Created after destroy() began; never lent.
        join_all(orphans.into_iter().map(|resource| self.dispose(resource))).await;

        if report.expired + report.created + report.failed + report.rejected > 0 {
            debug!(
                expired = report.expired,
                created = report.created,
                failed = report.failed,
                rejected = report.rejected,
                "sync pass complete"
            );
        }
        report
    }
}
