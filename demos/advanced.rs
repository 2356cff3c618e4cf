//! Advanced features: aging, queue limits, hooks, Prometheus export

use async_trait::async_trait;
use lendpool::{CancelReason, Manage, Pool, PoolConfiguration, PoolError, PoolHooks, ResourceId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Connection {
    id: usize,
    data: String,
}

impl Connection {
    fn new(id: usize) -> Self {
        Self {
            id,
            data: format!("Connection-{}", id),
        }
    }
}

#[derive(Default)]
struct Connections {
    next: AtomicUsize,
}

#[async_trait]
impl Manage for Connections {
    type Resource = Connection;
    type Error = std::io::Error;

    async fn create(&self) -> Result<Connection, Self::Error> {
        Ok(Connection::new(self.next.fetch_add(1, Ordering::Relaxed)))
    }

    async fn dispose(&self, connection: Connection) -> Result<(), Self::Error> {
        println!("   Disposed {}", connection.data);
        Ok(())
    }
}

#[derive(Default)]
struct Printer;

impl PoolHooks for Printer {
    fn on_borrow(&self, id: ResourceId) {
        println!("   [hook] borrow {}", id);
    }

    fn on_release(&self, id: ResourceId) {
        println!("   [hook] release {}", id);
    }

    fn on_request_cancelled(&self, reason: CancelReason) {
        println!("   [hook] request cancelled: {}", reason);
    }
}

#[tokio::main]
async fn main() {
    println!("=== lendpool - Advanced Features ===\n");

    // Example 1: Max age
    max_age().await;

    // Example 2: Queue limit
    queue_limit().await;

    // Example 3: Hooks
    hooks().await;

    // Example 4: Prometheus metrics
    prometheus_export().await;
}

async fn max_age() {
    println!("1. Max Age:");

    let config = PoolConfiguration::new()
        .with_max_resources(1)
        .with_resource_max_age(Duration::from_millis(200));
    let pool = Pool::new(Connections::default(), config).unwrap();

    let first = pool.borrow().await.unwrap();
    println!("   Using: {:?}", *first);
    tokio::time::sleep(Duration::from_millis(250)).await;
    first.release().unwrap();

    let second = pool.borrow().await.unwrap();
    println!("   Replacement: {:?} (id {})", *second, second.id);
    println!();
}

async fn queue_limit() {
    println!("2. Queue Limit:");

    let config = PoolConfiguration::new()
        .with_max_resources(1)
        .with_max_outstanding_borrows(1);
    let pool = Pool::new(Connections::default(), config).unwrap();
    let _held = pool.borrow().await.unwrap();

    let waiter = tokio::spawn({
        let pool = pool.clone();
        async move { pool.borrow_with_timeout(Duration::from_millis(100)).await.map(|_| ()) }
    });
    while pool.pending_requests() == 0 {
        tokio::task::yield_now().await;
    }

    match pool.borrow().await {
        Err(PoolError::MaxOutstandingBorrowsExceeded) => println!("   Second waiter rejected"),
        other => println!("   Unexpected: {:?}", other.map(|_| ())),
    }
    println!("   First waiter: {:?}", waiter.await.unwrap());
    println!();
}

async fn hooks() {
    println!("3. Hooks:");

    let pool = Pool::with_hooks(
        Connections::default(),
        PoolConfiguration::new().with_max_resources(1),
        Arc::new(Printer),
    )
    .unwrap();

    {
        let _connection = pool.borrow().await.unwrap();
        let _ = pool.borrow_with_timeout(Duration::from_millis(10)).await;
    }
    pool.destroy().await.unwrap();
    println!();
}

async fn prometheus_export() {
    println!("4. Prometheus Metrics Export:");

    let pool = Pool::new(
        Connections::default(),
        PoolConfiguration::new().with_min_resources(3),
    )
    .unwrap();
    pool.sync().await;

    {
        let _first = pool.borrow().await.unwrap();
        let _second = pool.borrow().await.unwrap();

        let mut tags = std::collections::HashMap::new();
        tags.insert("service".to_string(), "example".to_string());
        tags.insert("env".to_string(), "dev".to_string());

        let prometheus_text = pool.export_metrics_prometheus("example_pool", Some(&tags));
        println!("{}", prometheus_text);
    }
}
