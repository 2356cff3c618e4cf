mod common;

use common::{settle, Event, Recorder, Tracked};
use lendpool::{CancelReason, Pool, PoolConfiguration, PoolError, ResourceId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[tokio::test]
async fn initial_sync_fills_to_minimum() {
    let manager = Tracked::new();
    let pool = Pool::new(
        manager.clone(),
        PoolConfiguration::new().with_min_resources(5).with_max_resources(10),
    )
    .unwrap();

    pool.sync().await;

    assert_eq!(pool.size(), 5);
    assert_eq!(pool.idle_count(), 5);
    assert_eq!(pool.pending_requests(), 0);
    assert_eq!(manager.created(), 5);
}

#[tokio::test]
async fn third_borrow_waits_for_a_release_and_receives_it() {
    let pool = Pool::new(Tracked::new(), PoolConfiguration::new().with_max_resources(2)).unwrap();

    let first = pool.borrow().await.unwrap();
    let second = pool.borrow().await.unwrap();
    assert_eq!(pool.idle_count(), 0);

    let third = tokio::spawn({
        let pool = pool.clone();
        async move {
            let loan = pool.borrow().await.unwrap();
            (loan.id(), *loan)
        }
    });
    while pool.pending_requests() == 0 {
        tokio::task::yield_now().await;
    }
    settle().await;
    assert!(!third.is_finished());
    assert_eq!(pool.size(), 2);

    let released = (second.id(), *second);
    second.release().unwrap();

    assert_eq!(third.await.unwrap(), released);
    drop(first);
}

#[tokio::test(start_paused = true)]
async fn queued_borrow_times_out_and_leaves_queue() {
    let recorder = Arc::new(Recorder::default());
    let pool = Pool::with_hooks(
        Tracked::new(),
        PoolConfiguration::new().with_max_resources(1),
        recorder.clone(),
    )
    .unwrap();
    let _held = pool.borrow().await.unwrap();

    let started = tokio::time::Instant::now();
    let result = pool.borrow_with_timeout(Duration::from_millis(10)).await;
    let waited = started.elapsed();

    assert!(matches!(result, Err(PoolError::Timeout(d)) if d == Duration::from_millis(10)));
    assert!(waited >= Duration::from_millis(10));
    assert!(waited < Duration::from_millis(50));
    assert_eq!(pool.pending_requests(), 0);
    assert_eq!(recorder.count(&Event::Cancelled(CancelReason::Timeout)), 1);
    assert_eq!(pool.get_metrics().borrow_timeouts, 1);
}

#[tokio::test]
async fn default_timeout_applies_when_none_given() {
    let pool = Pool::new(
        Tracked::new(),
        PoolConfiguration::new()
            .with_max_resources(1)
            .with_default_borrow_timeout(Duration::from_millis(15)),
    )
    .unwrap();
    let _held = pool.borrow().await.unwrap();

    assert!(matches!(pool.borrow().await, Err(PoolError::Timeout(_))));
}

#[tokio::test]
async fn destroy_rejects_every_pending_borrow() {
    let gate = Arc::new(Semaphore::new(0));
    let manager = Tracked::gated(Arc::clone(&gate));
    let recorder = Arc::new(Recorder::default());
    let pool = Pool::with_hooks(
        manager.clone(),
        PoolConfiguration::new().with_min_resources(0).with_max_resources(10),
        recorder.clone(),
    )
    .unwrap();

    let borrows: Vec<_> = (0..10)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.borrow().await.map(|loan| loan.id()) })
        })
        .collect();
    while pool.pending_requests() < 10 {
        tokio::task::yield_now().await;
    }

    let destroy = tokio::spawn({
        let pool = pool.clone();
        async move { pool.destroy().await }
    });

    for borrow in borrows {
        assert!(matches!(borrow.await.unwrap(), Err(PoolError::PoolDestroyed)));
    }
    assert_eq!(recorder.count(&Event::Cancelled(CancelReason::Destroyed)), 10);
    assert_eq!(pool.pending_requests(), 0);

    // Creations already in flight finish and are disposed, never lent.
    gate.add_permits(10);
    destroy.await.unwrap().unwrap();
    settle().await;

    assert_eq!(pool.size(), 0);
    assert_eq!(manager.disposed().len(), manager.created());
    assert_eq!(recorder.count(&Event::Cancelled(CancelReason::Destroyed)), 10);
    assert!(matches!(pool.borrow().await, Err(PoolError::PoolDestroyed)));
}

#[tokio::test]
async fn borrow_queued_mid_pass_gets_a_follow_up_pass() {
    let gate = Arc::new(Semaphore::new(0));
    let manager = Tracked::gated(Arc::clone(&gate));
    let pool = Pool::new(manager.clone(), PoolConfiguration::new().with_max_resources(2)).unwrap();

    let first = tokio::spawn({
        let pool = pool.clone();
        async move { pool.borrow().await.map(|loan| *loan) }
    });
    while manager.started() == 0 {
        tokio::task::yield_now().await;
    }

    // The pass creating for `first` is parked on the gate.
    let second = tokio::spawn({
        let pool = pool.clone();
        async move { pool.borrow().await.map(|loan| *loan) }
    });
    while pool.pending_requests() < 2 {
        tokio::task::yield_now().await;
    }
    assert_eq!(manager.started(), 1);

    gate.add_permits(2);
    let mut lent = vec![first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
    lent.sort_unstable();

    assert_eq!(lent, vec![0, 1]);
    assert_eq!(manager.created(), 2);
    assert_eq!(pool.pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn aged_resource_is_disposed_on_release() {
    let manager = Tracked::new();
    let pool = Pool::new(
        manager.clone(),
        PoolConfiguration::new()
            .with_max_resources(1)
            .with_resource_max_age(Duration::from_millis(50)),
    )
    .unwrap();

    let loan = pool.borrow().await.unwrap();
    let old_id = loan.id();
    let old_value = *loan;

    tokio::time::sleep(Duration::from_millis(60)).await;
    loan.release().unwrap();
    settle().await;

    assert_eq!(pool.idle_count(), 0);
    assert_eq!(manager.disposed(), vec![old_value]);

    let fresh = pool.borrow().await.unwrap();
    assert_ne!(fresh.id(), old_id);
    assert_eq!(manager.created(), 2);
}

#[tokio::test(start_paused = true)]
async fn aged_idle_resource_is_skipped_on_borrow() {
    let manager = Tracked::new();
    let pool = Pool::new(
        manager.clone(),
        PoolConfiguration::new()
            .with_min_resources(1)
            .with_resource_max_age(Duration::from_millis(50)),
    )
    .unwrap();
    pool.sync().await;

    tokio::time::advance(Duration::from_millis(60)).await;
    let loan = pool.borrow().await.unwrap();

    assert_eq!(*loan, 1, "the expired resource 0 is never lent");
    settle().await;
    assert_eq!(manager.disposed(), vec![0]);
}

#[tokio::test]
async fn waiters_are_served_in_arrival_order() {
    let pool = Pool::new(Tracked::new(), PoolConfiguration::new().with_max_resources(1)).unwrap();
    let held = pool.borrow().await.unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut waiters = Vec::new();
    for n in 0..4 {
        let waiter_pool = pool.clone();
        let order = Arc::clone(&order);
        waiters.push(tokio::spawn(async move {
            let loan = waiter_pool.borrow().await.unwrap();
            order.lock().push(n);
            loan.release().unwrap();
        }));
        while pool.pending_requests() <= n {
            tokio::task::yield_now().await;
        }
    }

    held.release().unwrap();
    for waiter in waiters {
        waiter.await.unwrap();
    }
    assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn destroy_twice_disposes_once() {
    let manager = Tracked::new();
    let pool = Pool::new(manager.clone(), PoolConfiguration::new().with_min_resources(3)).unwrap();
    pool.sync().await;

    pool.destroy().await.unwrap();
    pool.destroy().await.unwrap();

    let mut disposed = manager.disposed();
    disposed.sort_unstable();
    assert_eq!(disposed, vec![0, 1, 2]);
}

#[tokio::test]
async fn hooks_pair_enqueue_with_dequeue() {
    let recorder = Arc::new(Recorder::default());
    let pool = Pool::with_hooks(
        Tracked::new(),
        PoolConfiguration::new().with_max_resources(1),
        recorder.clone(),
    )
    .unwrap();

    let loan = pool.borrow().await.unwrap();
    let id = loan.id();
    loan.release().unwrap();

    assert_eq!(
        *recorder.events.lock(),
        vec![Event::Enqueued, Event::Dequeued, Event::Borrow(id), Event::Release(id)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_churn_respects_bounds() {
    let pool = Pool::new(Tracked::new(), PoolConfiguration::new().with_max_resources(4)).unwrap();
    let on_loan: Arc<Mutex<HashSet<ResourceId>>> = Arc::new(Mutex::new(HashSet::new()));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let pool = pool.clone();
            let on_loan = Arc::clone(&on_loan);
            tokio::spawn(async move {
                for _ in 0..25 {
                    let loan = pool.borrow().await.unwrap();
                    assert!(on_loan.lock().insert(loan.id()), "resource lent twice");
                    assert!(pool.size() <= 4);
                    tokio::task::yield_now().await;
                    on_loan.lock().remove(&loan.id());
                    loan.release().unwrap();
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    let metrics = pool.get_metrics();
    assert!(metrics.size <= 4);
    assert_eq!(metrics.total_borrowed, 16 * 25);
    assert_eq!(metrics.total_released, 16 * 25);
    assert_eq!(metrics.pending_requests, 0);
    assert_eq!(metrics.idle_resources, metrics.size);
}
