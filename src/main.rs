// lendpool demo binary
// The library lives in lib.rs; run the demos with: cargo run --example basic

use async_trait::async_trait;
use lendpool::{Manage, Pool, PoolConfiguration, PoolResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

struct Workers {
    next: AtomicUsize,
}

#[async_trait]
impl Manage for Workers {
    type Resource = usize;
    type Error = std::io::Error;

    async fn create(&self) -> Result<usize, Self::Error> {
        Ok(self.next.fetch_add(1, Ordering::Relaxed))
    }

    async fn dispose(&self, _worker: usize) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> PoolResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    println!("=== lendpool ===");
    println!("See demos/ for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    let pool = Pool::new(
        Workers { next: AtomicUsize::new(1) },
        PoolConfiguration::new().with_min_resources(2).with_max_resources(4),
    )?;
    pool.sync().await;

    {
        let worker = pool.borrow().await?;
        println!("  Borrowed worker: {}", *worker);
    }

    println!("  Idle after return: {}", pool.idle_count());
    pool.destroy().await
}
