//! The capacity gate, resource registry, and allocator/returner (C1-C3),
//! grounded on `nebula-resource/src/pool.rs`'s `Pool<R>`/`PoolInner`/
//! `Entry<T>` shape: one `parking_lot::Mutex` guards the registry, a
//! `tokio::sync::Semaphore` guards capacity and construction/hooks never
//! run while the mutex is held.
//!
//! One deliberate divergence from the teacher: there, a permit is taken and
//! forgotten on *every* `acquire` (reuse or create) and unconditionally
//! returned on every release, which bounds concurrently-checked-out
//! entries but not the idle queue's size over time. Here a permit is tied
//! to a *living entry* — taken only when a new one is constructed, returned
//! only when one is destroyed — which is what actually keeps
//! `n_total <= max_size` true at every instant, not just in the steady
//! state. See DESIGN.md.
//!
//! A consequence: recycling an entry back to `avail` frees it up for reuse
//! without freeing a semaphore permit, so a caller blocked in `acquire`
//! cannot be woken by the semaphore alone. A `tokio::sync::Notify` plays
//! the role of spec.md §4.2's `cond` — every site that pushes to `avail`
//! or frees a permit calls `notify_waiters()` afterwards, and `acquire`
//! loops between a non-blocking reuse/create attempt and waiting on that
//! `Notify`, registering interest before each re-check so no wakeup is
//! missed.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::PoolConfig;
use crate::entry::{Entry, State};
use crate::error::{PoolError, PoolResult};
use crate::guard::Guard;
use crate::hooks::Hooks;
use crate::stats::{EntryStats, PoolConfigStats, PoolStats};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Debug-reload frameworks (e.g. a dev server that re-executes the binary's
/// startup path to probe for syntax errors before the real run) construct
/// pools twice in quick succession; eagerly starting a housekeeper for the
/// throwaway first one is wasted work and, worse, an extra background task
/// racing the real one against the same external resource. Setting
/// `RESPOOL_SKIP_FIRST_HOUSEKEEPER_START` defers *only* the very first
/// `Pool::new` call's eager start in the process to the lazy path
/// (`ensure_housekeeper_started` still runs it on first `acquire`), and is
/// a no-op when unset — production deployments that never set it see no
/// change in behavior.
fn skip_eager_housekeeper_start() -> bool {
    use std::sync::atomic::AtomicBool as StdAtomicBool;
    static SEEN_FIRST_INIT: StdAtomicBool = StdAtomicBool::new(false);

    std::env::var_os("RESPOOL_SKIP_FIRST_HOUSEKEEPER_START").is_some()
        && !SEEN_FIRST_INIT.swap(true, Ordering::SeqCst)
}

/// User-supplied constructor. Mirrors spec.md's `(int) -> Resource`: it
/// takes the creation index and returns the new resource or an error. It
/// is a plain synchronous closure — the pool provides the asynchrony
/// (timeouts, blocking waits), the factory itself is trusted to be quick,
/// matching the "hooks/factory may suspend arbitrarily but always run
/// outside any pool lock" contract in spec.md §5.
pub type FactoryFn<T> = Arc<dyn Fn(u64) -> Result<T, BoxError> + Send + Sync>;

#[derive(Default, Clone)]
struct Counters {
    n_created: u64,
    n_destroyed: u64,
    n_acquisitions: u64,
    n_returns: u64,
    n_timeouts: u64,
    n_health_fail: u64,
    n_killed: u64,
    n_bad_returns: u64,
}

struct Registry<T> {
    avail: VecDeque<Entry<T>>,
    busy: HashMap<u64, Entry<T>>,
    counters: Counters,
    shutdown: bool,
    sweep_count: u64,
}

struct PoolInner<T> {
    factory: FactoryFn<T>,
    config: PoolConfig,
    hooks: Hooks<T>,
    registry: Mutex<Registry<T>>,
    sem: Arc<Semaphore>,
    /// Wakes a caller blocked in `acquire` when an entry is recycled back
    /// to `avail` or destroyed — the permit-per-living-entry model (see
    /// the module doc) means capacity freed by a recycle never shows up as
    /// a semaphore permit, so `acquire` cannot rely on the semaphore alone
    /// to learn "an entry became available". Rust-idiomatic substitute for
    /// spec.md §4.2's `cond.notify_all()`.
    notify: Notify,
    next_id: AtomicU64,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
    housekeeper_started: AtomicBool,
    housekeeper_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    cancel: CancellationToken,
}

/// A bounded, self-healing pool of opaque resources (C1-C3 combined).
pub struct Pool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let r = self.inner.registry.lock();
        f.debug_struct("Pool")
            .field("pool_id", &self.inner.config.pool_id)
            .field("n_avail", &r.avail.len())
            .field("n_busy", &r.busy.len())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Pool<T> {
    /// Construct a new pool. Rejects an invalid configuration before any
    /// resource is built. Starts the housekeeper immediately when
    /// `min_size > 0` (spec.md §3 "Lifecycle"); otherwise it starts lazily
    /// on first `acquire`.
    pub fn new(factory: FactoryFn<T>, config: PoolConfig, hooks: Hooks<T>) -> PoolResult<Self> {
        config.validate()?;
        let permits = if config.max_size == 0 { Semaphore::MAX_PERMITS } else { config.max_size };
        let pool = Self {
            inner: Arc::new(PoolInner {
                factory,
                config,
                hooks,
                registry: Mutex::new(Registry {
                    avail: VecDeque::new(),
                    busy: HashMap::new(),
                    counters: Counters::default(),
                    shutdown: false,
                    sweep_count: 0,
                }),
                sem: Arc::new(Semaphore::new(permits)),
                notify: Notify::new(),
                next_id: AtomicU64::new(0),
                started_at: Instant::now(),
                started_at_utc: Utc::now(),
                housekeeper_started: AtomicBool::new(false),
                housekeeper_handle: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        };
        if pool.inner.config.min_size > 0 && !skip_eager_housekeeper_start() {
            pool.ensure_housekeeper_started();
        }
        Ok(pool)
    }

    fn pool_id(&self) -> &str {
        &self.inner.config.pool_id
    }

    fn ensure_housekeeper_started(&self) {
        if self.inner.housekeeper_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let pool = self.clone();
        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(async move {
            crate::housekeeper::run(pool, cancel).await;
        });
        *self.inner.housekeeper_handle.lock() = Some(handle);
    }

    /// Acquire a resource, waiting up to `config.timeout` for either an
    /// entry to become available or a capacity permit (`Duration::ZERO`
    /// waits forever). `caller_key` identifies the holder and is opaque to
    /// the pool (spec.md §3's `holder` field).
    pub async fn acquire(&self, caller_key: u64) -> PoolResult<Guard<T>> {
        self.ensure_housekeeper_started();

        if self.inner.registry.lock().shutdown {
            return Err(PoolError::closed(self.pool_id()));
        }

        let started = Instant::now();
        let outcome = if self.inner.config.timeout.is_zero() {
            Ok(self.acquire_id(caller_key).await)
        } else {
            tokio::time::timeout(self.inner.config.timeout, self.acquire_id(caller_key)).await
        };
        let id = match outcome {
            Ok(Ok(id)) => id,
            Ok(Err(err)) => return Err(err),
            Err(_elapsed) => {
                self.inner.registry.lock().counters.n_timeouts += 1;
                return Err(PoolError::timeout(self.pool_id(), started.elapsed()));
            }
        };

        // Take the object out of its registered entry so the `getter` hook
        // (and the caller afterwards) can use it while the entry's
        // bookkeeping (id/holder/uses/timestamps) stays visible in `busy`.
        let obj = {
            let mut r = self.inner.registry.lock();
            r.busy.get_mut(&id).expect("just inserted/reused").take()
        };

        if let Err(err) = self.inner.hooks.run_getter(&obj) {
            self.inner.hooks.run_closer(&obj);
            {
                let mut r = self.inner.registry.lock();
                r.busy.remove(&id);
                r.counters.n_destroyed += 1;
            }
            self.inner.sem.add_permits(1);
            self.inner.notify.notify_waiters();
            return Err(PoolError::hook(self.pool_id(), err));
        }

        let pool = self.clone();
        Ok(Guard::new(obj, move |obj| pool.release(id, obj)))
    }

    /// Find an id to hand back: reuse an available entry, or spend a
    /// capacity permit constructing a new one. Loops until one of those
    /// succeeds, parking on `notify` between attempts rather than blocking
    /// on the semaphore directly — a recycle (busy -> avail) frees up an
    /// entry without ever touching the semaphore, so a waiter blocked on
    /// `sem.acquire` alone would never learn about it.
    async fn acquire_id(&self, caller_key: u64) -> PoolResult<u64> {
        loop {
            if self.inner.registry.lock().shutdown {
                return Err(PoolError::closed(self.pool_id()));
            }

            // Registered before we re-check state, so a notification sent
            // between this line and the `.await` below is never missed.
            let notified = self.inner.notify.notified();

            let reused_id = {
                let mut r = self.inner.registry.lock();
                r.avail.pop_front().map(|mut entry| {
                    entry.mark_acquired(caller_key);
                    r.counters.n_acquisitions += 1;
                    let id = entry.id;
                    r.busy.insert(id, entry);
                    id
                })
            };
            if let Some(id) = reused_id {
                return Ok(id);
            }

            match Arc::clone(&self.inner.sem).try_acquire_owned() {
                Ok(permit) => {
                    let next_id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
                    match (self.inner.factory)(next_id) {
                        Ok(obj) => {
                            self.inner.hooks.run_opener(&obj);
                            let mut entry = Entry::new(next_id, obj);
                            entry.mark_acquired(caller_key);
                            {
                                let mut r = self.inner.registry.lock();
                                r.counters.n_created += 1;
                                r.counters.n_acquisitions += 1;
                                r.busy.insert(next_id, entry);
                            }
                            permit.forget();
                            return Ok(next_id);
                        }
                        Err(err) => {
                            drop(permit); // returns the permit automatically
                            return Err(PoolError::factory(self.pool_id(), err));
                        }
                    }
                }
                Err(_) => {
                    notified.await;
                }
            }
        }
    }

    /// Re-insert (recycle) or permanently remove (retire) a previously
    /// acquired object. Called from the returned `Guard`'s drop — the
    /// Rust-idiomatic replacement for spec.md §4.2's `release(obj)`: Rust's
    /// ownership model makes it impossible for a caller to call this twice
    /// on the same guard, but a long-hold-kill race can still remove the
    /// bookkeeping entry before the guard drops, reproducing the same
    /// "release of an unknown object" path.
    fn release(&self, id: u64, obj: T) {
        let (mut entry, shutdown) = {
            let mut r = self.inner.registry.lock();
            let shutdown = r.shutdown;
            match r.busy.remove(&id) {
                Some(entry) => (entry, shutdown),
                None => {
                    r.counters.n_bad_returns += 1;
                    #[cfg(feature = "tracing")]
                    tracing::warn!(pool_id = %self.pool_id(), id, "release() of an unknown object");
                    drop(r);
                    // The only way `busy` no longer has this id is the
                    // housekeeper's long-hold kill (phase 4), which removes
                    // the bookkeeping entry before the holder's guard drops
                    // but cannot reach the object itself (it is loaned out,
                    // not stored in the entry). This is that interrupt: the
                    // object only becomes reachable here, at the holder's
                    // eventual release, so `closer` fires now instead of
                    // never (spec.md §4.3 phase 4, "attempt to interrupt the
                    // holder ... via closer").
                    self.inner.hooks.run_closer(&obj);
                    drop(obj);
                    return;
                }
            }
        };

        let max_use = self.inner.config.max_use;
        let mut retire = shutdown
            || (max_use > 0 && entry.uses >= max_use)
            || entry.state == State::Retiring;

        if self.inner.hooks.run_retter(&obj).is_err() {
            retire = true;
        }

        if retire {
            self.inner.hooks.run_closer(&obj);
            drop(obj);
            let mut r = self.inner.registry.lock();
            r.counters.n_returns += 1;
            r.counters.n_destroyed += 1;
            drop(r);
            self.inner.sem.add_permits(1);
        } else {
            entry.mark_returned();
            if let Some(trace) = self.inner.hooks.run_tracer(&obj) {
                entry.trace = Some(trace);
            }
            entry.restore(obj);
            let mut r = self.inner.registry.lock();
            r.counters.n_returns += 1;
            r.avail.push_back(entry);
        }
        // Either branch made an entry reusable (recycle) or freed a permit
        // for a new one (retire) — wake whichever `acquire` call is waiting.
        self.inner.notify.notify_waiters();
    }

    /// A point-in-time snapshot of counters, configuration, and per-entry
    /// state (C6, spec.md §4.5/§6).
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let r = self.inner.registry.lock();
        let now = Utc::now();
        let to_entry_stats = |e: &Entry<T>| EntryStats {
            id: e.id,
            created_at: self.to_utc(e.created_at),
            last_get_at: e.last_get_at.map(|t| self.to_utc(t)),
            last_ret_at: e.last_ret_at.map(|t| self.to_utc(t)),
            uses: e.uses,
            holder: e.holder,
            trace: e.trace.clone(),
        };
        PoolStats {
            pool_id: self.inner.config.pool_id.clone(),
            version: env!("CARGO_PKG_VERSION"),
            started_at: self.inner.started_at_utc,
            now,
            n_total: r.avail.len() + r.busy.len(),
            n_avail: r.avail.len(),
            n_busy: r.busy.len(),
            n_created: r.counters.n_created,
            n_destroyed: r.counters.n_destroyed,
            n_acquisitions: r.counters.n_acquisitions,
            n_returns: r.counters.n_returns,
            n_timeouts: r.counters.n_timeouts,
            n_health_fail: r.counters.n_health_fail,
            n_killed: r.counters.n_killed,
            n_bad_returns: r.counters.n_bad_returns,
            config: PoolConfigStats::from(&self.inner.config),
            avail: r.avail.iter().map(to_entry_stats).collect(),
            busy: r.busy.values().map(to_entry_stats).collect(),
            user: self.inner.hooks.run_stats(),
        }
    }

    fn to_utc(&self, instant: Instant) -> DateTime<Utc> {
        let delta = instant.saturating_duration_since(self.inner.started_at);
        self.inner.started_at_utc + chrono::Duration::from_std(delta).unwrap_or_default()
    }

    /// Shut down the pool: stop admitting new acquisitions, stop the
    /// housekeeper, and destroy every available entry. In-use entries are
    /// destroyed as they are returned (their release path sees
    /// `shutdown == true` and retires them).
    pub async fn shutdown(&self) {
        {
            let mut r = self.inner.registry.lock();
            r.shutdown = true;
        }
        self.inner.cancel.cancel();
        self.inner.sem.close();
        self.inner.notify.notify_waiters();

        let drained: Vec<_> = {
            let mut r = self.inner.registry.lock();
            r.avail.drain(..).collect()
        };
        for entry in drained {
            self.inner.hooks.run_closer(entry.obj_ref());
            let mut r = self.inner.registry.lock();
            r.counters.n_destroyed += 1;
        }

        if let Some(handle) = self.inner.housekeeper_handle.lock().take() {
            let _ = handle.await;
        }
    }

    pub(crate) fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Run one housekeeper sweep (spec.md §4.3). Builds its worklists under
    /// the lock, then acts (factory/hooks) outside it.
    pub(crate) async fn sweep(&self) {
        let cfg = self.inner.config.clone_for_sweep();

        // Phase 1+2+5: drain `avail` wholesale, decide per-entry fate outside
        // the lock (health hooks need `&T`), then push survivors back.
        let due_for_health = {
            let mut r = self.inner.registry.lock();
            r.sweep_count += 1;
            r.sweep_count % u64::from(cfg.health_freq) == 0
        };

        let drained: Vec<_> = {
            let mut r = self.inner.registry.lock();
            r.avail.drain(..).collect()
        };

        let mut survivors = VecDeque::with_capacity(drained.len());
        let mut destroyed_avail = 0u64;
        let mut health_failed = 0u64;
        for mut entry in drained {
            let idle_expired = cfg.max_avail_delay > std::time::Duration::ZERO
                && entry.idle_for() > cfg.max_avail_delay;
            let use_expired = cfg.max_use > 0 && entry.uses >= cfg.max_use;

            if idle_expired || use_expired {
                self.inner.hooks.run_closer(entry.obj_ref());
                destroyed_avail += 1;
                continue;
            }

            if due_for_health && !self.inner.hooks.run_health(entry.obj_ref()) {
                self.inner.hooks.run_closer(entry.obj_ref());
                destroyed_avail += 1;
                health_failed += 1;
                continue;
            }

            survivors.push_back(entry);
        }

        {
            let mut r = self.inner.registry.lock();
            r.avail.extend(survivors);
            r.counters.n_destroyed += destroyed_avail;
            r.counters.n_health_fail += health_failed;
        }
        if destroyed_avail > 0 {
            self.inner.sem.add_permits(destroyed_avail as usize);
        }

        // Phase 3+4: warn/kill long-held busy entries.
        let (to_kill, to_warn): (Vec<u64>, Vec<(u64, std::time::Duration)>) = {
            let r = self.inner.registry.lock();
            let mut kill = Vec::new();
            let mut warn = Vec::new();
            for (id, entry) in &r.busy {
                let held = entry.held_for();
                if cfg.max_using_delay_kill > std::time::Duration::ZERO && held > cfg.max_using_delay_kill {
                    kill.push(*id);
                } else if cfg.max_using_delay > std::time::Duration::ZERO && held > cfg.max_using_delay {
                    warn.push((*id, held));
                }
            }
            (kill, warn)
        };

        #[cfg(feature = "tracing")]
        for (id, held) in &to_warn {
            tracing::warn!(pool_id = %self.pool_id(), id, ?held, "resource held past max_using_delay");
        }
        #[cfg(not(feature = "tracing"))]
        let _ = to_warn;

        if !to_kill.is_empty() {
            let mut killed = 0u64;
            for id in to_kill {
                let entry = {
                    let mut r = self.inner.registry.lock();
                    r.busy.remove(&id)
                };
                if let Some(entry) = entry {
                    // The object is loaned to the holder and not present in
                    // the entry, so `closer` cannot run against it here. We
                    // release the slot and count the kill now; the holder's
                    // eventual `release` will find its id gone from `busy`,
                    // count it as a bad return, and run `closer` there —
                    // that is the "attempt to interrupt the holder ... via
                    // closer" spec.md §4.3 phase 4 asks for.
                    drop(entry);
                    killed += 1;
                    #[cfg(feature = "tracing")]
                    tracing::warn!(pool_id = %self.pool_id(), id, "killed long-held resource");
                }
            }
            if killed > 0 {
                let mut r = self.inner.registry.lock();
                r.counters.n_killed += killed;
                r.counters.n_destroyed += killed;
                drop(r);
                self.inner.sem.add_permits(killed as usize);
            }
        }

        // Phase 6: top up to min_size. Every entry this loop adds is a live
        // entry like any other, so it must hold a capacity permit exactly
        // like the create path in `acquire_id` — otherwise a bounded pool's
        // `n_total` can exceed `max_size` once topped-up entries are reused
        // and the slots they never reserved are handed out again.
        loop {
            let (n_total, shutdown) = {
                let r = self.inner.registry.lock();
                (r.avail.len() + r.busy.len(), r.shutdown)
            };
            if shutdown || n_total >= cfg.min_size {
                break;
            }
            let permit = match Arc::clone(&self.inner.sem).try_acquire_owned() {
                Ok(permit) => permit,
                // No capacity left to top up into; stop for this sweep
                // rather than exceeding max_size.
                Err(_) => break,
            };
            let next_id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
            match (self.inner.factory)(next_id) {
                Ok(obj) => {
                    self.inner.hooks.run_opener(&obj);
                    let mut r = self.inner.registry.lock();
                    r.avail.push_back(Entry::new(next_id, obj));
                    r.counters.n_created += 1;
                    permit.forget();
                }
                Err(_err) => {
                    drop(permit); // returns the permit automatically
                    let mut r = self.inner.registry.lock();
                    r.counters.n_health_fail += 1;
                    break;
                }
            }
        }

        // Any of the phases above may have freed a permit or pushed a fresh
        // entry into `avail` — wake whatever is waiting in `acquire`.
        self.inner.notify.notify_waiters();
    }

    pub(crate) fn effective_hk_delay(&self) -> std::time::Duration {
        self.inner.config.effective_hk_delay()
    }
}

impl PoolConfig {
    fn clone_for_sweep(&self) -> PoolConfig {
        self.clone()
    }
}
