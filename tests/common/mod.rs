#![allow(dead_code)]

use async_trait::async_trait;
use lendpool::{CancelReason, Manage, PoolHooks, ResourceId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, thiserror::Error)]
#[error("test manager failure")]
pub struct TestFailure;

#[derive(Default)]
pub struct TrackedState {
    pub started: AtomicUsize,
    pub created: AtomicUsize,
    pub disposed: Mutex<Vec<usize>>,
    pub gate: Option<Arc<Semaphore>>,
}

/// Hands out sequential ids and records every disposal.
///
/// With a gate, each `create` waits for one permit first. Clones share state.
#[derive(Clone, Default)]
pub struct Tracked {
    state: Arc<TrackedState>,
}

impl Tracked {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            state: Arc::new(TrackedState {
                gate: Some(gate),
                ..Default::default()
            }),
        }
    }

    /// Creations entered, including those still waiting on the gate
    pub fn started(&self) -> usize {
        self.state.started.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> Vec<usize> {
        self.state.disposed.lock().clone()
    }
}

#[async_trait]
impl Manage for Tracked {
    type Resource = usize;
    type Error = TestFailure;

    async fn create(&self) -> Result<usize, TestFailure> {
        self.state.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.state.gate {
            gate.acquire().await.map_err(|_| TestFailure)?.forget();
        }
        Ok(self.state.created.fetch_add(1, Ordering::SeqCst))
    }

    async fn dispose(&self, resource: usize) -> Result<(), TestFailure> {
        self.state.disposed.lock().push(resource);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Borrow(ResourceId),
    Release(ResourceId),
    Enqueued,
    Dequeued,
    Cancelled(CancelReason),
}

/// Records every hook call in order
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn count(&self, wanted: &Event) -> usize {
        self.events.lock().iter().filter(|e| *e == wanted).count()
    }
}

impl PoolHooks for Recorder {
    fn on_borrow(&self, id: ResourceId) {
        self.events.lock().push(Event::Borrow(id));
    }

    fn on_release(&self, id: ResourceId) {
        self.events.lock().push(Event::Release(id));
    }

    fn on_request_enqueued(&self) {
        self.events.lock().push(Event::Enqueued);
    }

    fn on_request_dequeued(&self) {
        self.events.lock().push(Event::Dequeued);
    }

    fn on_request_cancelled(&self, reason: CancelReason) {
        self.events.lock().push(Event::Cancelled(reason));
    }
}

/// Let spawned pool tasks make progress
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
