//! Pool configuration options

use std::time::Duration;

use crate::errors::{PoolError, PoolResult};

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use lendpool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_min_resources(2)
///     .with_max_resources(8)
///     .with_default_borrow_timeout(Duration::from_secs(5))
///     .with_resource_max_age(Duration::from_secs(3600));
///
/// assert_eq!(config.max_resources, 8);
/// assert_eq!(config.resource_max_age, Some(Duration::from_secs(3600)));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfiguration {
    /// Population the pool keeps alive even with no demand
    pub min_resources: usize,

    /// Upper bound on resources owned by the pool (idle plus on loan)
    pub max_resources: usize,

    /// Resources at least this old are disposed instead of being lent again
    pub resource_max_age: Option<Duration>,

    /// Maximum number of queued borrow requests; unbounded when unset
    pub max_outstanding_borrows: Option<usize>,

    /// Timeout applied to `borrow()` when the caller gives none
    pub default_borrow_timeout: Option<Duration>,

    /// Interval of the background reconciliation; on demand only when unset
    pub sync_interval: Option<Duration>,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            min_resources: 0,
            max_resources: 10,
            resource_max_age: None,
            max_outstanding_borrows: None,
            default_borrow_timeout: None,
            sync_interval: None,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum population
    pub fn with_min_resources(mut self, count: usize) -> Self {
        self.min_resources = count;
        self
    }

    /// Set the maximum population
    ///
    /// # Examples
    ///
    /// ```
    /// use lendpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_max_resources(50);
    /// assert_eq!(config.max_resources, 50);
    /// ```
    pub fn with_max_resources(mut self, count: usize) -> Self {
        self.max_resources = count;
        self
    }

    /// Set the age after which resources are retired
    pub fn with_resource_max_age(mut self, age: Duration) -> Self {
        self.resource_max_age = Some(age);
        self
    }

    /// Cap the wait queue
    pub fn with_max_outstanding_borrows(mut self, count: usize) -> Self {
        self.max_outstanding_borrows = Some(count);
        self
    }

    /// Set the default borrow timeout
    pub fn with_default_borrow_timeout(mut self, timeout: Duration) -> Self {
        self.default_borrow_timeout = Some(timeout);
        self
    }

    /// Run reconciliation periodically
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Check the configuration for values the pool cannot work with
    ///
    /// # Examples
    ///
    /// ```
    /// use lendpool::{PoolConfiguration, PoolError};
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_min_resources(5)
    ///     .with_max_resources(2);
    ///
    /// assert!(matches!(config.validate(), Err(PoolError::InvalidConfiguration(_))));
    /// ```
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_resources == 0 {
            return Err(PoolError::InvalidConfiguration(
                "max_resources must be at least 1".to_string(),
            ));
        }
        if self.min_resources > self.max_resources {
            return Err(PoolError::InvalidConfiguration(format!(
                "min_resources ({}) exceeds max_resources ({})",
                self.min_resources, self.max_resources
            )));
        }
        if self.max_outstanding_borrows == Some(0) {
            return Err(PoolError::InvalidConfiguration(
                "max_outstanding_borrows must be at least 1 when set".to_string(),
            ));
        }
        if self.sync_interval == Some(Duration::ZERO) {
            return Err(PoolError::InvalidConfiguration(
                "sync_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
