//! Health reporting for resource pools

use crate::metrics::Population;

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// # use async_trait::async_trait;
/// # use lendpool::{Manage, Pool, PoolConfiguration};
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
/// let pool = Pool::new(Numbers, PoolConfiguration::new().with_min_resources(3)).unwrap();
/// pool.sync().await;
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.idle_resources, 3);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Loaned share of the maximum population (0.0 to 1.0)
    pub utilization: f64,

    /// Idle resources
    pub idle_resources: usize,

    /// Resources on loan
    pub loaned_resources: usize,

    /// Borrowers waiting for a resource
    pub pending_requests: usize,

    /// Maximum population
    pub max_resources: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub(crate) fn new(population: Population, destroyed: bool) -> Self {
        let utilization = population.utilization();
        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if destroyed {
            warnings.push("Pool has been destroyed".to_string());
            is_healthy = false;
        }

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        // Waiters are normal under load; only flag them.
        if population.pending > 0 {
            warnings.push(format!("{} borrow request(s) waiting", population.pending));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            idle_resources: population.idle,
            loaned_resources: population.loaned(),
            pending_requests: population.pending,
            max_resources: population.max,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturated_pool_is_unhealthy() {
        let status = HealthStatus::new(
            Population {
                size: 10,
                idle: 0,
                pending: 3,
                max: 10,
            },
            false,
        );
        assert!(!status.is_healthy());
        assert_eq!(status.warning_count, 2);
        assert_eq!(status.loaned_resources, 10);
    }

    #[test]
    fn destroyed_pool_is_unhealthy() {
        let status = HealthStatus::new(Population { max: 4, ..Default::default() }, true);
        assert!(!status.is_healthy());
        assert_eq!(status.warnings, vec!["Pool has been destroyed".to_string()]);
    }
}
