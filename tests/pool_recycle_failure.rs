//! `retter` hook failure retires the resource instead of recycling it
//! (spec.md §4.2 "release(obj)", fate decision: "the `retter` hook ...
//! indicates failure").

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use respool::{FactoryFn, Hooks, Pool, PoolConfig};

struct Resources {
    fail_retter: Arc<AtomicBool>,
    create_count: Arc<AtomicU32>,
}

fn setup(max_size: usize) -> (Pool<String>, Resources) {
    let fail_retter = Arc::new(AtomicBool::new(false));
    let create_count = Arc::new(AtomicU32::new(0));
    let cc = Arc::clone(&create_count);
    let factory: FactoryFn<String> = Arc::new(move |_id| {
        let n = cc.fetch_add(1, Ordering::SeqCst);
        Ok(format!("inst-{n}"))
    });
    let flag = Arc::clone(&fail_retter);
    let hooks = Hooks::new().retter(move |_obj| {
        if flag.load(Ordering::SeqCst) {
            Err("retter rejected this resource".into())
        } else {
            Ok(())
        }
    });
    let config = PoolConfig {
        min_size: 0,
        max_size,
        timeout: Duration::from_secs(1),
        ..Default::default()
    };
    let pool = Pool::new(factory, config, hooks).unwrap();
    (pool, Resources { fail_retter, create_count })
}

#[tokio::test]
async fn failed_retter_destroys_the_instance() {
    let (pool, res) = setup(2);
    res.fail_retter.store(true, Ordering::SeqCst);

    {
        let guard = pool.acquire(1).await.unwrap();
        assert_eq!(*guard, "inst-0");
    } // drop triggers release -> retter fails -> retire

    let stats = pool.stats();
    assert_eq!(stats.n_destroyed, 1, "a failed retter should retire the resource");
    assert_eq!(stats.n_avail, 0, "the retired resource must not sit in avail");
    assert_eq!(stats.n_total, 0);
}

#[tokio::test]
async fn failed_retter_does_not_leak_capacity() {
    let (pool, res) = setup(1); // only one slot
    res.fail_retter.store(true, Ordering::SeqCst);

    {
        let guard = pool.acquire(1).await.unwrap();
        assert_eq!(*guard, "inst-0");
    }
    assert_eq!(pool.stats().n_destroyed, 1);

    // The permit from the destroyed entry must be available again.
    let guard = pool.acquire(2).await.expect("pool should be usable after a failed retter");
    assert_eq!(*guard, "inst-1");
    assert_eq!(res.create_count.load(Ordering::SeqCst), 2);

    res.fail_retter.store(false, Ordering::SeqCst);
    drop(guard);

    let stats = pool.stats();
    assert_eq!(stats.n_avail, 1, "a successful retter recycles normally");
    assert_eq!(stats.n_destroyed, 1, "no additional destroys");
}
