//! Pool exhaustion and recovery (spec.md §8 scenario 1, "Basic pool").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use respool::{FactoryFn, Hooks, Pool, PoolConfig, PoolError};

fn counting_factory() -> FactoryFn<String> {
    Arc::new(|id| Ok(format!("R{id}")))
}

#[tokio::test]
async fn exhaustion_returns_timeout_then_recovers_on_release() {
    let config = PoolConfig {
        min_size: 2,
        max_size: 2,
        timeout: Duration::from_millis(300),
        ..Default::default()
    };
    let pool = Pool::new(counting_factory(), config, Hooks::new()).unwrap();

    let a = pool.acquire(1).await.expect("first acquire should succeed");
    let b = pool.acquire(2).await.expect("second acquire should succeed");
    assert_ne!(*a, *b);
    assert_eq!(pool.stats().n_total, 2);

    let third = pool.acquire(3).await;
    assert!(matches!(third, Err(PoolError::Timeout { .. })));
    assert_eq!(pool.stats().n_timeouts, 1);

    let a_value = (*a).clone();
    drop(a);
    let c = pool.acquire(4).await.expect("a slot freed by the drop");
    assert_eq!(*c, a_value, "the recycled resource is handed back out");

    drop(b);
    drop(c);
}

#[tokio::test]
async fn repeated_timeouts_are_all_counted() {
    let config = PoolConfig {
        min_size: 0,
        max_size: 1,
        timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let pool = Pool::new(counting_factory(), config, Hooks::new()).unwrap();

    let _held = pool.acquire(1).await.unwrap();
    for _ in 0..3 {
        let _ = pool.acquire(2).await;
    }

    let stats = pool.stats();
    assert_eq!(stats.n_timeouts, 3);
    assert_eq!(stats.n_acquisitions, 1);
}

#[tokio::test]
async fn unbounded_pool_never_waits() {
    let config = PoolConfig { max_size: 0, min_size: 0, ..Default::default() };
    let counter = Arc::new(AtomicU64::new(0));
    let c = Arc::clone(&counter);
    let factory: FactoryFn<u64> = Arc::new(move |_| Ok(c.fetch_add(1, Ordering::SeqCst)));
    let pool = Pool::new(factory, config, Hooks::new()).unwrap();

    let mut guards = Vec::new();
    for _ in 0..50 {
        guards.push(pool.acquire(0).await.unwrap());
    }
    assert_eq!(pool.stats().n_total, 50);
}
