//! Pool engine: lending, returning, eviction and teardown

use crate::config::PoolConfiguration;
use crate::deferred::{deferred, Completion, Deferred};
use crate::errors::{CancelReason, ManagerError, PoolError, PoolResult};
use crate::eviction;
use crate::health::HealthStatus;
use crate::hooks::{NoopHooks, PoolHooks};
use crate::manager::Manage;
#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;
use crate::metrics::{MetricsTracker, PoolMetrics, Population};
use crate::sync::SyncControl;

use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Identity the pool assigns to each resource it creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A resource together with the metadata that travels with it.
///
/// Lives in the idle queue or inside a [`Loan`]; the pool's known set only
/// holds the id.
#[derive(Debug)]
pub(crate) struct Entry<T> {
    pub id: ResourceId,
    pub resource: T,
    pub created_at: Instant,
}

pub(crate) type Outcome<T> = PoolResult<Entry<T>>;

pub(crate) struct PendingRequest<T> {
    pub id: u64,
    pub deferred: Deferred<Outcome<T>>,
    pub enqueued_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Active,
    Destroying,
}

pub(crate) struct State<T> {
    pub lifecycle: Lifecycle,
    pub known: HashSet<ResourceId>,
    pub idle: VecDeque<Entry<T>>,
    pub waiting: VecDeque<PendingRequest<T>>,
    next_request: u64,
}

impl<T> State<T> {
    fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Active,
            known: HashSet::new(),
            idle: VecDeque::new(),
            waiting: VecDeque::new(),
            next_request: 0,
        }
    }

    pub fn is_destroying(&self) -> bool {
        self.lifecycle == Lifecycle::Destroying
    }

    fn enqueue(&mut self, deferred: Deferred<Outcome<T>>) -> u64 {
        let id = self.next_request;
        self.next_request += 1;
        self.waiting.push_back(PendingRequest {
            id,
            deferred,
            enqueued_at: Instant::now(),
        });
        id
    }
}

/// State shared between the pool handle, its loans and background syncs
pub(crate) struct Shared<M: Manage> {
    pub manager: M,
    pub config: PoolConfiguration,
    pub hooks: Arc<dyn PoolHooks>,
    pub state: Mutex<State<M::Resource>>,
    pub metrics: MetricsTracker,
    pub syncer: SyncControl,
    pub runtime: Handle,
    next_resource: AtomicU64,
}

impl<M: Manage> Shared<M> {
    pub fn next_resource_id(&self) -> ResourceId {
        ResourceId(self.next_resource.fetch_add(1, Ordering::Relaxed))
    }

    pub fn population(&self) -> Population {
        let state = self.state.lock();
        Population {
            size: state.known.len(),
            idle: state.idle.len(),
            pending: state.waiting.len(),
            max: self.config.max_resources,
        }
    }

    fn note_borrow(&self, id: ResourceId) {
        MetricsTracker::incr(&self.metrics.total_borrowed);
        self.hooks.on_borrow(id);
    }

    /// Pop an idle resource, discarding at most one expired entry on the way.
    fn take_idle(
        &self,
        state: &mut State<M::Resource>,
        expired: &mut Vec<M::Resource>,
    ) -> Option<Entry<M::Resource>> {
        for _ in 0..2 {
            let entry = state.idle.pop_front()?;
            if eviction::is_expired(entry.created_at, self.config.resource_max_age) {
                state.known.remove(&entry.id);
                MetricsTracker::incr(&self.metrics.resources_expired);
                expired.push(entry.resource);
                continue;
            }
            return Some(entry);
        }
        None
    }

    /// Give `entry` to the oldest live waiter. Returns it if nobody takes it.
    pub fn hand_off(
        &self,
        state: &mut State<M::Resource>,
        mut entry: Entry<M::Resource>,
    ) -> Option<Entry<M::Resource>> {
        while let Some(request) = state.waiting.pop_front() {
            self.hooks.on_request_dequeued();
            if request.deferred.is_abandoned() {
                continue;
            }
            let id = entry.id;
            match request.deferred.settle(Ok(entry)) {
                Ok(()) => {
                    trace!(
                        resource = %id,
                        request = request.id,
                        waited = ?request.enqueued_at.elapsed(),
                        "lent to queued request"
                    );
                    self.note_borrow(id);
                    return None;
                }
                Err(returned) => match returned {
                    Ok(back) => entry = back,
                    Err(_) => return None,
                },
            }
        }
        Some(entry)
    }

    /// Remove a queued request. False when it was already settled.
    fn cancel_request(&self, request_id: u64, reason: Option<CancelReason>) -> bool {
        let mut state = self.state.lock();
        let Some(position) = state.waiting.iter().position(|r| r.id == request_id) else {
            return false;
        };
        state.waiting.remove(position);
        if let Some(reason) = reason {
            self.hooks.on_request_cancelled(reason);
        }
        self.hooks.on_request_dequeued();
        true
    }

    /// Accept a freshly created resource. Returns it if the pool is shutting down.
    pub fn register(&self, resource: M::Resource) -> Option<M::Resource> {
        let mut state = self.state.lock();
        if state.is_destroying() {
            return Some(resource);
        }
        let id = self.next_resource_id();
        state.known.insert(id);
        let entry = Entry {
            id,
            resource,
            created_at: Instant::now(),
        };
        if let Some(entry) = self.hand_off(&mut state, entry) {
            state.idle.push_back(entry);
        }
        None
    }

    pub fn release(self: &Arc<Self>, entry: Entry<M::Resource>) -> PoolResult<()> {
        let id = entry.id;
        let mut state = self.state.lock();

        if !state.known.contains(&id) {
            drop(state);
            warn!(
                resource = %id,
                "released resource is not tracked by the pool; disposing it"
            );
            self.dispose_detached(vec![entry.resource]);
            return Err(PoolError::UnknownResource(id));
        }

        MetricsTracker::incr(&self.metrics.total_released);
        self.hooks.on_release(id);

        let expired = eviction::is_expired(entry.created_at, self.config.resource_max_age);
        if expired || state.is_destroying() {
            state.known.remove(&id);
            drop(state);
            if expired {
                MetricsTracker::incr(&self.metrics.resources_expired);
                debug!(resource = %id, "released resource exceeded its max age");
            }
            self.dispose_detached(vec![entry.resource]);
            self.trigger_sync();
            return Ok(());
        }

        if let Some(entry) = self.hand_off(&mut state, entry) {
            state.idle.push_back(entry);
        }
        Ok(())
    }

    pub async fn dispose(&self, resource: M::Resource) -> Result<(), ManagerError> {
        let result = self.manager.dispose(resource).await;
        MetricsTracker::incr(&self.metrics.resources_disposed);
        result.map_err(|err| {
            MetricsTracker::incr(&self.metrics.disposal_failures);
            warn!(error = %err, "resource disposal failed");
            ManagerError::new(err)
        })
    }

    /// Dispose resources off the caller's path
    pub fn dispose_detached(self: &Arc<Self>, resources: Vec<M::Resource>) {
        if resources.is_empty() {
            return;
        }
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            join_all(resources.into_iter().map(|r| shared.dispose(r))).await;
        });
    }
}

/// A resource on loan from a [`Pool`].
///
/// Dereferences to the resource. Hand it back with [`Loan::release`]; a loan
/// that is simply dropped is released automatically.
pub struct Loan<M: Manage> {
    entry: Option<Entry<M::Resource>>,
    shared: Arc<Shared<M>>,
}

impl<M: Manage> Loan<M> {
    fn new(entry: Entry<M::Resource>, shared: Arc<Shared<M>>) -> Self {
        Self {
            entry: Some(entry),
            shared,
        }
    }

    fn entry(&self) -> &Entry<M::Resource> {
        self.entry.as_ref().expect("BUG: Loan used after release")
    }

    pub fn id(&self) -> ResourceId {
        self.entry().id
    }

    /// When the underlying resource was created
    pub fn created_at(&self) -> std::time::Instant {
        self.entry().created_at.into_std()
    }

    pub fn age(&self) -> Duration {
        self.entry().created_at.elapsed()
    }

    /// Return the resource to the pool.
    ///
    /// Fails with [`PoolError::UnknownResource`] if the pool no longer tracks
    /// this resource (it was removed while on loan); the resource is then
    /// disposed.
    pub fn release(mut self) -> PoolResult<()> {
        match self.entry.take() {
            Some(entry) => self.shared.release(entry),
            None => Ok(()),
        }
    }

    /// Evict the loaned resource and wait for its disposal
    pub async fn remove(mut self) -> PoolResult<()> {
        let Some(entry) = self.entry.take() else {
            return Ok(());
        };
        self.shared.state.lock().known.remove(&entry.id);
        debug!(resource = %entry.id, "removing loaned resource");
        let result = self.shared.dispose(entry.resource).await;
        self.shared.trigger_sync();
        result.map_err(PoolError::Manager)
    }
}

impl<M: Manage> Deref for Loan<M> {
    type Target = M::Resource;

    fn deref(&self) -> &Self::Target {
        &self.entry().resource
    }
}

impl<M: Manage> DerefMut for Loan<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entry.as_mut().expect("BUG: Loan used after release").resource
    }
}

impl<M: Manage> Drop for Loan<M> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            if let Err(err) = self.shared.release(entry) {
                debug!(error = %err, "implicit release failed");
            }
        }
    }
}

impl<M: Manage> fmt::Debug for Loan<M>
where
    M::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry {
            Some(entry) => f
                .debug_struct("Loan")
                .field("id", &entry.id)
                .field("resource", &entry.resource)
                .finish(),
            None => f.debug_struct("Loan").finish_non_exhaustive(),
        }
    }
}

/// A borrow waiting in the queue. Withdraws the request if dropped early.
struct QueuedBorrow<'a, M: Manage> {
    shared: &'a Arc<Shared<M>>,
    request_id: u64,
    completion: Completion<Outcome<M::Resource>>,
    armed: bool,
}

impl<M: Manage> QueuedBorrow<'_, M> {
    /// The borrow's timer fired. Withdraws the request and reports the
    /// timeout, unless the request was settled first: then the settled
    /// outcome wins. `None` means it was settled but the outcome is not in
    /// the slot yet.
    fn time_out(&mut self, limit: Duration) -> Option<Outcome<M::Resource>> {
        if self
            .shared
            .cancel_request(self.request_id, Some(CancelReason::Timeout))
        {
            self.armed = false;
            MetricsTracker::incr(&self.shared.metrics.borrow_timeouts);
            trace!(request = self.request_id, ?limit, "borrow timed out");
            return Some(Err(PoolError::Timeout(limit)));
        }
        self.completion.try_take()
    }
}

impl<M: Manage> Drop for QueuedBorrow<'_, M> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.shared.cancel_request(self.request_id, None) {
            trace!(request = self.request_id, "abandoned borrow withdrawn");
            return;
        }
        // Settled after the borrower stopped listening; give the resource back.
        if let Some(Ok(entry)) = self.completion.try_take() {
            let _ = self.shared.release(entry);
        }
    }
}

enum Attempt<T> {
    Lent(Entry<T>),
    Queued(u64, Completion<Outcome<T>>),
}

/// Asynchronous pool of resources produced by a [`Manage`] implementation.
///
/// Cloning the pool is cheap; all clones share the same resources.
pub struct Pool<M: Manage> {
    shared: Arc<Shared<M>>,
}

impl<M: Manage> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M: Manage> Pool<M> {
    /// Create a pool. Must be called from within a Tokio runtime.
    ///
    /// The first reconciliation is scheduled, not run, so the minimum
    /// population appears shortly after construction.
    pub fn new(manager: M, config: PoolConfiguration) -> PoolResult<Self> {
        Self::with_hooks(manager, config, Arc::new(NoopHooks))
    }

    /// Create a pool that reports lifecycle events to `hooks`
    pub fn with_hooks(
        manager: M,
        config: PoolConfiguration,
        hooks: Arc<dyn PoolHooks>,
    ) -> PoolResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| PoolError::RuntimeUnavailable)?;

        let sync_interval = config.sync_interval;
        let shared = Arc::new(Shared {
            manager,
            config,
            hooks,
            state: Mutex::new(State::new()),
            metrics: MetricsTracker::new(),
            syncer: SyncControl::new(),
            runtime,
            next_resource: AtomicU64::new(0),
        });

        if let Some(every) = sync_interval {
            SyncControl::start_ticker(&shared, every);
        }
        shared.trigger_sync();

        debug!(
            min = shared.config.min_resources,
            max = shared.config.max_resources,
            "pool created"
        );
        Ok(Self { shared })
    }

    /// Borrow a resource using the configured default timeout
    pub async fn borrow(&self) -> PoolResult<Loan<M>> {
        self.acquire(self.shared.config.default_borrow_timeout).await
    }

    /// Borrow a resource, giving up after `timeout`
    pub async fn borrow_with_timeout(&self, timeout: Duration) -> PoolResult<Loan<M>> {
        self.acquire(Some(timeout)).await
    }

    async fn acquire(&self, timeout: Option<Duration>) -> PoolResult<Loan<M>> {
        let shared = &self.shared;
        let mut expired = Vec::new();

        let attempt = {
            let mut state = shared.state.lock();
            if state.is_destroying() {
                return Err(PoolError::PoolDestroyed);
            }
            match shared.take_idle(&mut state, &mut expired) {
                Some(entry) => {
                    shared.note_borrow(entry.id);
                    Attempt::Lent(entry)
                }
                None => {
                    let (deferred, completion) = deferred();
                    let request_id = state.enqueue(deferred);
                    shared.hooks.on_request_enqueued();
                    Attempt::Queued(request_id, completion)
                }
            }
        };

        if !expired.is_empty() {
            shared.dispose_detached(expired);
            shared.trigger_sync();
        }

        let (request_id, completion) = match attempt {
            Attempt::Lent(entry) => return Ok(Loan::new(entry, Arc::clone(shared))),
            Attempt::Queued(request_id, completion) => (request_id, completion),
        };
        trace!(request = request_id, "no idle resource; borrow queued");
        shared.trigger_sync();

        let mut queued = QueuedBorrow {
            shared,
            request_id,
            completion,
            armed: true,
        };

        let outcome = match timeout {
            None => queued.completion.wait().await,
            Some(limit) => {
                let timed = tokio::time::timeout(limit, queued.completion.wait()).await;
                match timed {
                    Ok(outcome) => outcome,
                    Err(_) => match queued.time_out(limit) {
                        Some(outcome) => Some(outcome),
                        None => queued.completion.wait().await,
                    },
                }
            }
        };
        queued.armed = false;

        match outcome {
            Some(Ok(entry)) => Ok(Loan::new(entry, Arc::clone(shared))),
            Some(Err(err)) => Err(err),
            None => Err(PoolError::PoolDestroyed),
        }
    }

    /// Evict a resource by id.
    ///
    /// An idle resource is disposed and the destructor's result returned. A
    /// resource on loan is only forgotten: its holder still has it, and the
    /// destructor runs when the loan is handed back, at which point
    /// [`Loan::release`] reports [`PoolError::UnknownResource`]. Unknown ids
    /// are ignored.
    pub async fn remove(&self, id: ResourceId) -> PoolResult<()> {
        let idle = {
            let mut state = self.shared.state.lock();
            if !state.known.remove(&id) {
                return Ok(());
            }
            state
                .idle
                .iter()
                .position(|entry| entry.id == id)
                .and_then(|position| state.idle.remove(position))
        };

        let result = match idle {
            Some(entry) => {
                debug!(resource = %id, "removing idle resource");
                self.shared.dispose(entry.resource).await
            }
            None => {
                debug!(resource = %id, "forgetting loaned resource");
                Ok(())
            }
        };
        self.shared.trigger_sync();
        result.map_err(PoolError::Manager)
    }

    /// Shut the pool down.
    ///
    /// Fails every queued borrow with [`PoolError::PoolDestroyed`], disposes
    /// all idle resources and waits for any in-flight reconciliation.
    /// Resources on loan are left with their holders and disposed when
    /// returned. Disposal failures are aggregated into
    /// [`PoolError::Teardown`]. Calling `destroy` again is a no-op.
    pub async fn destroy(&self) -> PoolResult<()> {
        let shared = &self.shared;
        let (requests, idle) = {
            let mut state = shared.state.lock();
            if state.is_destroying() {
                return Ok(());
            }
            state.lifecycle = Lifecycle::Destroying;
            let requests: Vec<_> = state.waiting.drain(..).collect();
            let idle: Vec<_> = state.idle.drain(..).collect();
            for entry in &idle {
                state.known.remove(&entry.id);
            }
            (requests, idle)
        };
        shared.syncer.stop_ticker();

        debug!(
            rejected = requests.len(),
            idle = idle.len(),
            "destroying pool"
        );

        for request in requests {
            let _ = request.deferred.settle(Err(PoolError::PoolDestroyed));
            MetricsTracker::incr(&shared.metrics.destroy_rejections);
            shared.hooks.on_request_cancelled(CancelReason::Destroyed);
            shared.hooks.on_request_dequeued();
        }

        let results = join_all(idle.into_iter().map(|entry| shared.dispose(entry.resource))).await;
        shared.syncer.wait_idle().await;

        let mut failures = results.into_iter().filter_map(Result::err);
        match failures.next() {
            None => Ok(()),
            Some(first) => Err(PoolError::Teardown {
                failed: 1 + failures.count(),
                first,
            }),
        }
    }

    /// Run a reconciliation pass now and wait until none is in flight
    pub async fn sync(&self) {
        self.shared.trigger_sync();
        self.shared.syncer.wait_idle().await;
    }

    /// Borrow requests currently waiting for a resource
    pub fn pending_requests(&self) -> usize {
        self.shared.state.lock().waiting.len()
    }

    /// Resources owned by the pool, idle or on loan
    pub fn size(&self) -> usize {
        self.shared.state.lock().known.len()
    }

    pub fn idle_count(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    pub fn loaned_count(&self) -> usize {
        self.shared.population().loaned()
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.state.lock().is_destroying()
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.shared.config
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.shared.metrics.get_metrics(self.shared.population())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::new(self.shared.population(), self.is_destroyed())
    }
}
