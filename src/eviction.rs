//! Age tracking for pooled resources

use std::time::Duration;
use tokio::time::Instant;

/// A resource is expired once its age reaches `max_age`; never when unset.
pub(crate) fn is_expired(created_at: Instant, max_age: Option<Duration>) -> bool {
    match max_age {
        Some(max_age) => created_at.elapsed() >= max_age,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_expires_without_max_age() {
        let created_at = Instant::now() - Duration::from_millis(500);
        assert!(!is_expired(created_at, None));
    }

    #[test]
    fn expires_at_exact_age() {
        let created_at = Instant::now() - Duration::from_millis(50);
        assert!(is_expired(created_at, Some(Duration::from_millis(50))));
        assert!(!is_expired(created_at, Some(Duration::from_secs(60))));
    }

    #[test]
    fn zero_max_age_expires_immediately() {
        assert!(is_expired(Instant::now(), Some(Duration::ZERO)));
    }
}
