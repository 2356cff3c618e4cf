//! Observability hooks fired by the pool engine.
//!
//! Hooks are notifications only: they cannot veto or delay an operation.
//! They may be invoked while the pool's bookkeeping lock is held, so an
//! implementation must return quickly and must not call back into the pool.

use crate::errors::CancelReason;
use crate::ResourceId;

/// Receives lifecycle notifications from a [`Pool`](crate::Pool).
///
/// Every method has an empty default so implementors only override what
/// they care about.
///
/// # Examples
///
/// ```
/// use lendpool::{CancelReason, PoolHooks};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct Timeouts(AtomicUsize);
///
/// impl PoolHooks for Timeouts {
///     fn on_request_cancelled(&self, reason: CancelReason) {
///         if reason == CancelReason::Timeout {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait PoolHooks: Send + Sync + 'static {
    /// A resource was lent, either immediately or to a queued request
    fn on_borrow(&self, _id: ResourceId) {}

    /// A loan was handed back
    fn on_release(&self, _id: ResourceId) {}

    /// A borrow found nothing idle and joined the wait queue
    fn on_request_enqueued(&self) {}

    /// A request left the wait queue for any reason
    fn on_request_dequeued(&self) {}

    /// A queued request was failed without receiving a resource
    fn on_request_cancelled(&self, _reason: CancelReason) {}
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl PoolHooks for NoopHooks {}
