//! Basic usage examples for Pool

use async_trait::async_trait;
use lendpool::{Manage, Pool, PoolConfiguration};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct Numbers {
    next: AtomicUsize,
}

#[async_trait]
impl Manage for Numbers {
    type Resource = usize;
    type Error = std::io::Error;

    async fn create(&self) -> Result<usize, Self::Error> {
        Ok(self.next.fetch_add(1, Ordering::Relaxed))
    }

    async fn dispose(&self, _resource: usize) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    println!("=== lendpool - Basic Examples ===\n");

    // Example 1: Simple pool
    simple_pool().await;

    // Example 2: Pool with configuration
    configured_pool().await;

    // Example 3: Explicit release
    explicit_release().await;

    // Example 4: Metrics and health
    metrics_and_health().await;
}

async fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = Pool::new(Numbers::default(), PoolConfiguration::default()).unwrap();

    {
        let resource = pool.borrow().await.unwrap();
        println!("   Got resource: {}", *resource);
        // Resource automatically returned when dropped
    }

    println!("   Idle after return: {}\n", pool.idle_count());
}

async fn configured_pool() {
    println!("2. Configured Pool:");

    let config = PoolConfiguration::new()
        .with_min_resources(3)
        .with_max_resources(5);

    let pool = Pool::new(Numbers::default(), config).unwrap();
    pool.sync().await;
    println!("   Pre-populated: {}", pool.size());

    {
        let _first = pool.borrow().await.unwrap();
        let _second = pool.borrow().await.unwrap();
        println!("   Loaned resources: {}", pool.loaned_count());
        println!("   Idle resources: {}", pool.idle_count());
    }

    println!("   After return - Idle: {}\n", pool.idle_count());
}

async fn explicit_release() {
    println!("3. Explicit Release:");
    let config = PoolConfiguration::new().with_max_resources(1);
    let pool = Pool::new(Numbers::default(), config).unwrap();

    let resource = pool.borrow().await.unwrap();
    let id = resource.id();
    println!(
        "   Borrowed {} (raw id {}), {:?} old, created before now: {}",
        id,
        id.as_u64(),
        resource.age(),
        resource.created_at() <= std::time::Instant::now()
    );
    resource.release().unwrap();
    println!("   Released {}", id);

    pool.remove(id).await.unwrap();
    println!("   Removed {}; pool size is now {}\n", id, pool.size());
}

async fn metrics_and_health() {
    println!("4. Metrics and Health:");
    let config = PoolConfiguration::new().with_min_resources(2);
    let pool = Pool::new(Numbers::default(), config).unwrap();
    pool.sync().await;

    {
        let _resource = pool.borrow().await.unwrap();

        let metrics = pool.get_metrics();
        println!("   Total borrowed: {}", metrics.total_borrowed);
        println!("   Utilization: {:.1}%", metrics.utilization * 100.0);

        let health = pool.get_health_status();
        println!("   Healthy: {}", health.is_healthy());
        println!("   Warnings: {}", health.warning_count);
    }

    pool.destroy().await.unwrap();
    println!("   Destroyed: {}", pool.is_destroyed());
}
