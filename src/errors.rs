//! Error types for the resource pool

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Why a queued borrow request was cancelled before it received a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// The pool was destroyed while the request was waiting
    Destroyed,

    /// The wait queue grew past `max_outstanding_borrows`
    MaxQueuedRequestsExceeded,

    /// The borrow deadline elapsed
    Timeout,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Destroyed => write!(f, "destroyed"),
            Self::MaxQueuedRequestsExceeded => write!(f, "max queued requests exceeded"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// A failure reported by a [`Manage`](crate::Manage) implementation.
///
/// Shared behind an `Arc` so that [`PoolError`] stays `Clone`.
#[derive(Debug, Clone)]
pub struct ManagerError(Arc<dyn std::error::Error + Send + Sync>);

impl ManagerError {
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// The error as returned by the manager
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Pool has been destroyed")]
    PoolDestroyed,

    #[error("Borrow timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Maximum number of outstanding borrow requests exceeded")]
    MaxOutstandingBorrowsExceeded,

    #[error("Resource {0} is not known to this pool")]
    UnknownResource(crate::ResourceId),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Pool must be created from within a Tokio runtime")]
    RuntimeUnavailable,

    #[error("Resource manager failed: {0}")]
    Manager(#[source] ManagerError),

    #[error("{failed} resource(s) failed to dispose during teardown; first error: {first}")]
    Teardown {
        failed: usize,
        #[source]
        first: ManagerError,
    },
}

impl PoolError {
    /// True for the errors a borrower may see while the pool keeps running
    pub fn is_borrow_rejection(&self) -> bool {
        matches!(
            self,
            PoolError::Timeout(_) | PoolError::MaxOutstandingBorrowsExceeded
        )
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("socket closed")]
    struct SocketClosed;

    #[test]
    fn manager_error_keeps_source() {
        let err = PoolError::Manager(ManagerError::new(SocketClosed));
        assert_eq!(err.to_string(), "Resource manager failed: socket closed");

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "socket closed");
    }

    #[test]
    fn rejections_are_classified() {
        assert!(PoolError::MaxOutstandingBorrowsExceeded.is_borrow_rejection());
        assert!(PoolError::Timeout(std::time::Duration::from_millis(5)).is_borrow_rejection());
        assert!(!PoolError::PoolDestroyed.is_borrow_rejection());
    }
}
