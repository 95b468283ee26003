//! Shutdown (spec.md §3 "Lifecycle" / §7 "Fatal").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use respool::{FactoryFn, Hooks, Pool, PoolConfig, PoolError};

#[tokio::test]
async fn shutdown_rejects_new_acquisitions() {
    let factory: FactoryFn<String> = Arc::new(|id| Ok(format!("R{id}")));
    let pool = Pool::new(factory, PoolConfig::default(), Hooks::new()).unwrap();

    pool.shutdown().await;

    let err = pool.acquire(1).await;
    assert!(matches!(err, Err(PoolError::Closed { .. })));
}

#[tokio::test]
async fn shutdown_destroys_every_available_entry() {
    let closed = Arc::new(AtomicU64::new(0));
    let c = Arc::clone(&closed);
    let factory: FactoryFn<u64> = Arc::new(|id| Ok(id));
    let hooks = Hooks::new().closer(move |_obj| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    let config = PoolConfig {
        max_size: 3,
        min_size: 3,
        hk_delay: Duration::from_millis(5),
        ..Default::default()
    };
    let pool = Pool::new(factory, config, hooks).unwrap();

    // Force the eager housekeeper top-up to finish before shutdown.
    tokio::time::sleep(Duration::from_millis(50)).await;
    pool.shutdown().await;

    assert_eq!(closed.load(Ordering::SeqCst), pool.stats().n_destroyed);
    assert_eq!(pool.stats().n_avail, 0);
}

#[tokio::test]
async fn an_in_use_entry_is_retired_when_returned_after_shutdown() {
    let factory: FactoryFn<String> = Arc::new(|id| Ok(format!("R{id}")));
    let config = PoolConfig { max_size: 1, min_size: 0, ..Default::default() };
    let pool = Pool::new(factory, config, Hooks::new()).unwrap();

    let held = pool.acquire(1).await.unwrap();
    pool.shutdown().await;
    drop(held); // release() sees shutdown == true and retires instead of recycling

    assert_eq!(pool.stats().n_avail, 0);
    assert!(matches!(pool.acquire(2).await, Err(PoolError::Closed { .. })));
}
