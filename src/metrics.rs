//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time metrics for a pool
///
/// # Examples
///
/// ```
/// use lendpool::{PoolMetrics, PoolConfiguration};
/// # use async_trait::async_trait;
/// # use lendpool::{Manage, Pool};
/// # struct Numbers;
/// # #[async_trait]
/// # impl Manage for Numbers {
/// #     type Resource = u32;
/// #     type Error = std::io::Error;
/// #     async fn create(&self) -> Result<u32, Self::Error> { Ok(1) }
/// #     async fn dispose(&self, _: u32) -> Result<(), Self::Error> { Ok(()) }
/// # }
/// # #[tokio::main]
/// # async fn main() {
/// let pool = Pool::new(Numbers, PoolConfiguration::new().with_min_resources(2)).unwrap();
/// pool.sync().await;
///
/// let metrics: PoolMetrics = pool.get_metrics();
/// assert_eq!(metrics.resources_created, 2);
/// assert_eq!(metrics.idle_resources, 2);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolMetrics {
    /// Resources successfully produced by the manager
    pub resources_created: usize,

    /// Manager `create` calls that failed
    pub creation_failures: usize,

    /// Resources handed to the manager's `dispose`
    pub resources_disposed: usize,

    /// Manager `dispose` calls that failed
    pub disposal_failures: usize,

    /// Resources retired for exceeding their maximum age
    pub resources_expired: usize,

    /// Loans handed out
    pub total_borrowed: usize,

    /// Loans handed back
    pub total_released: usize,

    /// Queued borrows that hit their deadline
    pub borrow_timeouts: usize,

    /// Queued borrows rejected by the queue limit
    pub queue_rejections: usize,

    /// Queued borrows failed by `destroy()`
    pub destroy_rejections: usize,

    /// Resources owned by the pool right now
    pub size: usize,

    /// Resources ready to lend
    pub idle_resources: usize,

    /// Resources currently on loan
    pub loaned_resources: usize,

    /// Borrow requests waiting in the queue
    pub pending_requests: usize,

    /// Loaned share of the maximum population (0.0 to 1.0)
    pub utilization: f64,

    /// Configured maximum population
    pub max_resources: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("resources_created".to_string(), self.resources_created.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("resources_disposed".to_string(), self.resources_disposed.to_string());
        metrics.insert("disposal_failures".to_string(), self.disposal_failures.to_string());
        metrics.insert("resources_expired".to_string(), self.resources_expired.to_string());
        metrics.insert("total_borrowed".to_string(), self.total_borrowed.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("borrow_timeouts".to_string(), self.borrow_timeouts.to_string());
        metrics.insert("queue_rejections".to_string(), self.queue_rejections.to_string());
        metrics.insert("destroy_rejections".to_string(), self.destroy_rejections.to_string());
        metrics.insert("size".to_string(), self.size.to_string());
        metrics.insert("idle_resources".to_string(), self.idle_resources.to_string());
        metrics.insert("loaned_resources".to_string(), self.loaned_resources.to_string());
        metrics.insert("pending_requests".to_string(), self.pending_requests.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_resources".to_string(), self.max_resources.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Render a snapshot in the Prometheus text exposition format.
    ///
    /// Every series carries a `pool` label plus any extra `tags`.
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }

        let registry = Registry::new();
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let gauges = [
            ("lendpool_resources", "Resources owned by the pool", metrics.size),
            ("lendpool_resources_idle", "Resources ready to lend", metrics.idle_resources),
            ("lendpool_resources_loaned", "Resources currently on loan", metrics.loaned_resources),
            ("lendpool_requests_pending", "Borrow requests waiting", metrics.pending_requests),
            ("lendpool_resources_max", "Configured maximum population", metrics.max_resources),
        ];
        let counters = [
            ("lendpool_resources_created_total", "Resources created", metrics.resources_created),
            ("lendpool_creation_failures_total", "Failed creations", metrics.creation_failures),
            ("lendpool_resources_disposed_total", "Resources disposed", metrics.resources_disposed),
            ("lendpool_disposal_failures_total", "Failed disposals", metrics.disposal_failures),
            (
                "lendpool_resources_expired_total",
                "Resources retired by age",
                metrics.resources_expired,
            ),
            ("lendpool_borrows_total", "Loans handed out", metrics.total_borrowed),
            ("lendpool_releases_total", "Loans handed back", metrics.total_released),
            ("lendpool_borrow_timeouts_total", "Borrows that timed out", metrics.borrow_timeouts),
            (
                "lendpool_queue_rejections_total",
                "Borrows rejected by the queue limit",
                metrics.queue_rejections,
            ),
            (
                "lendpool_destroy_rejections_total",
                "Borrows failed by destroy",
                metrics.destroy_rejections,
            ),
        ];

        for (name, help, value) in gauges {
            if let Ok(gauge) = IntGauge::with_opts(opts(name, help)) {
                gauge.set(value as i64);
                let _ = registry.register(Box::new(gauge));
            }
        }
        for (name, help, value) in counters {
            if let Ok(counter) = IntCounter::with_opts(opts(name, help)) {
                counter.inc_by(value as u64);
                let _ = registry.register(Box::new(counter));
            }
        }
        let utilization = opts("lendpool_utilization", "Loaned share of capacity");
        if let Ok(gauge) = Gauge::with_opts(utilization) {
            gauge.set(metrics.utilization);
            let _ = registry.register(Box::new(gauge));
        }

        let mut buffer = Vec::new();
        if TextEncoder::new().encode(&registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Internal metrics tracker
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub resources_created: AtomicUsize,
    pub creation_failures: AtomicUsize,
    pub resources_disposed: AtomicUsize,
    pub disposal_failures: AtomicUsize,
    pub resources_expired: AtomicUsize,
    pub total_borrowed: AtomicUsize,
    pub total_released: AtomicUsize,
    pub borrow_timeouts: AtomicUsize,
    pub queue_rejections: AtomicUsize,
    pub destroy_rejections: AtomicUsize,
}

/// Live population figures sampled under the pool lock
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Population {
    pub size: usize,
    pub idle: usize,
    pub pending: usize,
    pub max: usize,
}

impl Population {
    pub fn loaned(&self) -> usize {
        self.size.saturating_sub(self.idle)
    }

    pub fn utilization(&self) -> f64 {
        if self.max > 0 {
            self.loaned() as f64 / self.max as f64
        } else {
            0.0
        }
    }
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, population: Population) -> PoolMetrics {
        PoolMetrics {
            resources_created: self.resources_created.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            resources_disposed: self.resources_disposed.load(Ordering::Relaxed),
            disposal_failures: self.disposal_failures.load(Ordering::Relaxed),
            resources_expired: self.resources_expired.load(Ordering::Relaxed),
            total_borrowed: self.total_borrowed.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            borrow_timeouts: self.borrow_timeouts.load(Ordering::Relaxed),
            queue_rejections: self.queue_rejections.load(Ordering::Relaxed),
            destroy_rejections: self.destroy_rejections.load(Ordering::Relaxed),
            size: population.size,
            idle_resources: population.idle,
            loaned_resources: population.loaned(),
            pending_requests: population.pending,
            utilization: population.utilization(),
            max_resources: population.max,
        }
    }
}
