//! Queueing, timeouts and concurrent borrowers

use async_trait::async_trait;
use lendpool::{Manage, Pool, PoolConfiguration};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Default)]
struct SlowConnections {
    opened: AtomicUsize,
}

#[async_trait]
impl Manage for SlowConnections {
    type Resource = String;
    type Error = std::io::Error;

    async fn create(&self) -> Result<String, Self::Error> {
        sleep(Duration::from_millis(20)).await;
        let n = self.opened.fetch_add(1, Ordering::Relaxed);
        println!("   Opened connection-{}", n);
        Ok(format!("connection-{}", n))
    }

    async fn dispose(&self, connection: String) -> Result<(), Self::Error> {
        println!("   Closed {}", connection);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    println!("=== lendpool - Async Examples ===\n");

    // Example 1: Borrow with timeout
    borrow_with_timeout().await;

    // Example 2: Waiters are served in order
    fifo_waiters().await;

    // Example 3: Concurrent access
    concurrent_access().await;
}

async fn borrow_with_timeout() {
    println!("1. Borrow with Timeout:");

    let config = PoolConfiguration::new()
        .with_max_resources(1)
        .with_default_borrow_timeout(Duration::from_millis(100));
    let pool = Pool::new(SlowConnections::default(), config).unwrap();

    // Take the only connection
    let _held = pool.borrow().await.unwrap();

    // Try to get another (should time out)
    match pool.borrow().await {
        Ok(_) => println!("   Got connection"),
        Err(e) => println!("   Error: {} (retryable: {})", e, e.is_borrow_rejection()),
    }
    println!("   Still waiting: {}\n", pool.pending_requests());
}

async fn fifo_waiters() {
    println!("2. FIFO Waiters:");
    let config = PoolConfiguration::new().with_max_resources(1);
    let pool = Pool::new(SlowConnections::default(), config).unwrap();
    let held = pool.borrow().await.unwrap();

    let mut waiters = Vec::new();
    for i in 0..3 {
        let waiter_pool = pool.clone();
        waiters.push(tokio::spawn(async move {
            let connection = waiter_pool.borrow().await.unwrap();
            println!("   Waiter {} got {}", i, *connection);
        }));
        while pool.pending_requests() <= i {
            tokio::task::yield_now().await;
        }
    }

    held.release().unwrap();
    for waiter in waiters {
        waiter.await.unwrap();
    }
    println!();
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");

    let pool = Arc::new(
        Pool::new(
            SlowConnections::default(),
            PoolConfiguration::new().with_min_resources(2).with_max_resources(5),
        )
        .unwrap(),
    );

    let mut handles = vec![];

    for i in 0..10 {
        let pool_clone = Arc::clone(&pool);
        let handle = tokio::spawn(async move {
            match pool_clone.borrow_with_timeout(Duration::from_secs(1)).await {
                Ok(connection) => {
                    println!("   Task {} got {}", i, *connection);
                    sleep(Duration::from_millis(50)).await;
                }
                Err(e) => println!("   Task {} couldn't borrow: {}", i, e),
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Final size: {}", pool.size());
    pool.destroy().await.unwrap();
}
