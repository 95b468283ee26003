//! The polymorphic proxy / access layer (C7, spec.md §4.6).
//!
//! Design notes §9 weighs a type-erased, dynamically-dispatched forwarding
//! layer against "a thin generic wrapper parameterised by the resource
//! type (statically dispatched)" and prefers the latter: there is no
//! runtime attribute lookup here. [`Proxy<T>`] hands back a typed
//! [`ProxyHandle`] that `Deref`s to `T`, so callers call the wrapped
//! resource's own methods directly through the handle — Rust's method
//! auto-deref plays the role spec.md's `__getattr__`-style forwarding
//! plays in the languages the distilled spec was written against.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::config::{PoolConfig, Scope};
use crate::error::{ProxyError, ProxyResult};
use crate::guard::Guard;
use crate::hooks::Hooks;
use crate::pool::{FactoryFn, Pool};

/// Injected identity function for the `Task` scope (spec.md §4.6 /
/// §9 "scope keys for lightweight tasks"): the pool has no dependency on
/// any specific cooperative-task/greenlet library, the caller supplies one.
pub type TaskKeyFn = Arc<dyn Fn() -> u64 + Send + Sync>;

enum Backend<T> {
    Fixed(Arc<T>),
    Pooled(Pool<T>),
}

impl<T> Clone for Backend<T> {
    fn clone(&self) -> Self {
        match self {
            Backend::Fixed(obj) => Backend::Fixed(Arc::clone(obj)),
            Backend::Pooled(pool) => Backend::Pooled(pool.clone()),
        }
    }
}

/// A polymorphic access layer over a pool (or a fixed shared object). One
/// instance holds either (a) a fixed shared resource with no pool, or (b)
/// a factory bound to an internal [`Pool`]; either can be bound late via
/// [`Proxy::set_obj`]/[`Proxy::set_fun`].
pub struct Proxy<T> {
    scope: Scope,
    task_key_provider: Option<TaskKeyFn>,
    backend: RwLock<Option<Backend<T>>>,
    pending_config: Mutex<Option<PoolConfig>>,
    held: DashMap<u64, Guard<T>>,
}

impl<T> fmt::Debug for Proxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("scope", &self.scope)
            .field("bound", &self.backend.read().is_some())
            .field("held", &self.held.len())
            .finish()
    }
}

impl<T> Proxy<T> {
    /// An unbound proxy with the given scoping discipline. Bind a resource
    /// with [`Proxy::set_obj`] or [`Proxy::set_fun`] before use.
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            task_key_provider: None,
            backend: RwLock::new(None),
            pending_config: Mutex::new(None),
            held: DashMap::new(),
        }
    }

    /// A `Task`-scoped proxy needs a key provider identifying "the
    /// currently running cooperative task" — there is no such concept the
    /// pool can discover on its own.
    #[must_use]
    pub fn with_task_key_provider(mut self, provider: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.task_key_provider = Some(Arc::new(provider));
        self
    }

    /// Late-bind a fixed, shared object. Discards any pending pool
    /// configuration: once an object is bound this way there is no pool.
    pub fn set_obj(&self, obj: T) {
        *self.backend.write() = Some(Backend::Fixed(Arc::new(obj)));
    }

    /// Delayed pool parameter override (spec.md §4.6 `_set_pool(**cfg)`):
    /// useful when the proxy is created before its configuration is known.
    /// Only effective before [`Proxy::set_fun`] is called — the pool's
    /// config is immutable once it exists.
    pub fn set_pool_config(&self, config: PoolConfig) -> ProxyResult<()> {
        if matches!(*self.backend.read(), Some(Backend::Pooled(_))) {
            return Err(ProxyError::AlreadyBound);
        }
        *self.pending_config.lock() = Some(config);
        Ok(())
    }
}

impl<T: Send + Sync + 'static> Proxy<T> {
    /// Late-bind a factory, building the internal pool from whatever
    /// configuration was staged via [`Proxy::set_pool_config`] (or
    /// defaults).
    pub fn set_fun(&self, factory: FactoryFn<T>, hooks: Hooks<T>) -> ProxyResult<()> {
        let config = self.pending_config.lock().take().unwrap_or_default();
        let pool = Pool::new(factory, config, hooks)?;
        *self.backend.write() = Some(Backend::Pooled(pool));
        Ok(())
    }

    fn resolve_key(&self, task_key: Option<u64>) -> u64 {
        match self.scope {
            Scope::Shared => 0,
            Scope::Thread => thread_key(),
            // Falls back to OS-thread identity when no provider is injected
            // (spec.md §9 "scope keys for lightweight tasks").
            Scope::Task => task_key
                .or_else(|| self.task_key_provider.as_ref().map(|p| p()))
                .unwrap_or_else(thread_key),
        }
    }

    /// Explicit acquire (`_get_obj()`). Returns the same resource on
    /// repeated calls from the same scope key until [`Proxy::ret_obj`] is
    /// called.
    pub async fn get_obj(&self, task_key: Option<u64>) -> ProxyResult<ProxyHandle<'_, T>> {
        let backend = self.backend.read().clone();
        match backend {
            None => Err(ProxyError::NoObject),
            Some(Backend::Fixed(obj)) => Ok(ProxyHandle::Fixed(obj)),
            Some(Backend::Pooled(pool)) => {
                let key = self.resolve_key(task_key);
                if !self.held.contains_key(&key) {
                    let guard = pool.acquire(key).await?;
                    self.held.insert(key, guard);
                }
                Ok(ProxyHandle::Pooled(self.held.get_mut(&key).expect("just inserted")))
            }
        }
    }

    /// Explicit release (`_ret_obj()`). A no-op for a fixed shared object
    /// and for a scope key with nothing held.
    pub fn ret_obj(&self, task_key: Option<u64>) -> ProxyResult<()> {
        if matches!(*self.backend.read(), Some(Backend::Fixed(_)) | None) {
            return Ok(());
        }
        let key = self.resolve_key(task_key);
        self.held.remove(&key);
        Ok(())
    }

    /// Test without acquiring (`_has_obj()`): whether this scope key
    /// currently holds a resource.
    pub fn has_obj(&self, task_key: Option<u64>) -> ProxyResult<bool> {
        match &*self.backend.read() {
            None => Ok(false),
            Some(Backend::Fixed(_)) => Ok(true),
            Some(Backend::Pooled(_)) => {
                let key = self.resolve_key(task_key);
                Ok(self.held.contains_key(&key))
            }
        }
    }

    /// Scoped acquisition: acquire on entry, auto-release on drop,
    /// bypassing the per-scope cache entirely (this call's checkout is
    /// independent of whatever `get_obj`/`ret_obj` may already hold for
    /// the same scope key).
    pub async fn scoped(&self, task_key: Option<u64>) -> ProxyResult<ScopedHandle<T>> {
        let backend = self.backend.read().clone();
        match backend {
            None => Err(ProxyError::NoObject),
            Some(Backend::Fixed(obj)) => Ok(ScopedHandle::Fixed(obj)),
            Some(Backend::Pooled(pool)) => {
                let key = self.resolve_key(task_key);
                let guard = pool.acquire(key).await?;
                Ok(ScopedHandle::Pooled(guard))
            }
        }
    }
}

fn thread_key() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    thread_local! {
        static KEY: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    KEY.with(|k| *k)
}

/// A handle to a resource returned by [`Proxy::get_obj`]. `Deref`s to the
/// wrapped resource so callers forward method calls through it directly.
pub enum ProxyHandle<'a, T> {
    /// Backed by a fixed shared object.
    Fixed(Arc<T>),
    /// Backed by an entry checked out of the internal pool, cached under
    /// the caller's scope key until `ret_obj` is called.
    Pooled(RefMut<'a, u64, Guard<T>>),
}

impl<T> Deref for ProxyHandle<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            ProxyHandle::Fixed(obj) => obj,
            ProxyHandle::Pooled(guard) => guard.value().deref(),
        }
    }
}

/// A handle returned by [`Proxy::scoped`]; releases on drop.
pub enum ScopedHandle<T> {
    /// Backed by a fixed shared object.
    Fixed(Arc<T>),
    /// Backed by a pool checkout, returned to the pool when this handle drops.
    Pooled(Guard<T>),
}

impl<T> Deref for ScopedHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            ScopedHandle::Fixed(obj) => obj,
            ScopedHandle::Pooled(guard) => guard,
        }
    }
}
