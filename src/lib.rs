//! # lendpool
//!
//! Asynchronous, Tokio-based pool for expensive resources such as
//! connections, workers or handles.
//!
//! ## Features
//!
//! - Minimum and maximum population, kept in bounds by a background
//!   reconciliation pass
//! - Strictly FIFO queueing of borrowers when nothing is idle
//! - Per-call and default borrow timeouts
//! - Optional cap on the number of queued borrowers
//! - Age-based retirement of resources
//! - Lifecycle hooks for instrumentation
//! - Metrics snapshots, health status and Prometheus export
//! - Graceful teardown with `destroy()`
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use lendpool::{Manage, Pool, PoolConfiguration};
//!
//! struct Sessions;
//!
//! #[async_trait]
//! impl Manage for Sessions {
//!     type Resource = String;
//!     type Error = std::io::Error;
//!
//!     async fn create(&self) -> Result<String, Self::Error> {
//!         Ok("session".to_string())
//!     }
//!
//!     async fn dispose(&self, _session: String) -> Result<(), Self::Error> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), lendpool::PoolError> {
//! let pool = Pool::new(Sessions, PoolConfiguration::new().with_max_resources(4))?;
//! {
//!     let session = pool.borrow().await?;
//!     println!("Got: {}", *session);
//!     // Returned to the pool when `session` goes out of scope
//! }
//! pool.destroy().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod deferred;
mod errors;
mod eviction;
mod health;
mod hooks;
mod manager;
mod metrics;
mod pool;
mod sync;

pub use config::PoolConfiguration;
pub use errors::{CancelReason, ManagerError, PoolError, PoolResult};
pub use health::HealthStatus;
pub use hooks::{NoopHooks, PoolHooks};
pub use manager::Manage;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::{Loan, Pool, ResourceId};
