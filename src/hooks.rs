//! User-supplied lifecycle callbacks (C5, spec.md §4.4).
//!
//! All hooks are optional, run outside the pool's lock, and never propagate
//! panics-as-invariant-violations: `getter`/`retter`/`health` failures retire
//! the resource, `opener`/`closer`/`tracer` failures are merely logged. This
//! mirrors the isolation discipline in `nebula-resource/src/hooks.rs`'s
//! `run_before`/`run_after`, simplified from a pluggable, priority-ordered
//! registry down to the single-callable-per-point contract spec.md §6
//! actually specifies.

use std::collections::HashMap;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fired after construction, before the new entry is registered as
/// available/in-use. Failures are logged, not fatal.
pub type OpenerFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Fired before handing a resource out. Returning `Err` retires the
/// resource instead of failing the `acquire` that triggered it; see
/// `pool::Pool::acquire`.
pub type GetterFn<T> = Arc<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>;

/// Fired when a resource is returned, before it is recycled or retired.
pub type RetterFn<T> = Arc<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>;

/// Fired before a resource is destroyed. Failures are logged, not fatal.
pub type CloserFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Liveness probe used by the housekeeper. `false` or a panic-free failure
/// retires the resource.
pub type HealthFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Diagnostic annotation surfaced in the stats snapshot's `trace` field.
pub type TracerFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// User-specific counters merged into the stats snapshot's `user` field.
pub type StatsFn = Arc<dyn Fn() -> HashMap<String, String> + Send + Sync>;

/// The full set of hooks a pool can be configured with. Every field is
/// `None` by default.
#[derive(Clone, Default)]
pub struct Hooks<T> {
    pub(crate) opener: Option<OpenerFn<T>>,
    pub(crate) getter: Option<GetterFn<T>>,
    pub(crate) retter: Option<RetterFn<T>>,
    pub(crate) closer: Option<CloserFn<T>>,
    pub(crate) health: Option<HealthFn<T>>,
    pub(crate) tracer: Option<TracerFn<T>>,
    pub(crate) stats: Option<StatsFn>,
}

impl<T> std::fmt::Debug for Hooks<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("opener", &self.opener.is_some())
            .field("getter", &self.getter.is_some())
            .field("retter", &self.retter.is_some())
            .field("closer", &self.closer.is_some())
            .field("health", &self.health.is_some())
            .field("tracer", &self.tracer.is_some())
            .field("stats", &self.stats.is_some())
            .finish()
    }
}

impl<T> Hooks<T> {
    /// An empty hook set — every lifecycle point is a no-op.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `opener` hook.
    #[must_use]
    pub fn opener(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.opener = Some(Arc::new(f));
        self
    }

    /// Set the `getter` hook.
    #[must_use]
    pub fn getter(mut self, f: impl Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static) -> Self {
        self.getter = Some(Arc::new(f));
        self
    }

    /// Set the `retter` hook.
    #[must_use]
    pub fn retter(mut self, f: impl Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static) -> Self {
        self.retter = Some(Arc::new(f));
        self
    }

    /// Set the `closer` hook.
    #[must_use]
    pub fn closer(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.closer = Some(Arc::new(f));
        self
    }

    /// Set the `health` hook.
    #[must_use]
    pub fn health(mut self, f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.health = Some(Arc::new(f));
        self
    }

    /// Set the `tracer` hook.
    #[must_use]
    pub fn tracer(mut self, f: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        self.tracer = Some(Arc::new(f));
        self
    }

    /// Set the `stats` hook.
    #[must_use]
    pub fn stats(mut self, f: impl Fn() -> HashMap<String, String> + Send + Sync + 'static) -> Self {
        self.stats = Some(Arc::new(f));
        self
    }

    pub(crate) fn run_opener(&self, obj: &T) {
        if let Some(f) = &self.opener {
            f(obj);
        }
    }

    pub(crate) fn run_getter(&self, obj: &T) -> Result<(), BoxError> {
        match &self.getter {
            Some(f) => f(obj),
            None => Ok(()),
        }
    }

    pub(crate) fn run_retter(&self, obj: &T) -> Result<(), BoxError> {
        match &self.retter {
            Some(f) => f(obj),
            None => Ok(()),
        }
    }

    pub(crate) fn run_closer(&self, obj: &T) {
        if let Some(f) = &self.closer {
            f(obj);
        }
    }

    pub(crate) fn run_health(&self, obj: &T) -> bool {
        match &self.health {
            Some(f) => f(obj),
            None => true,
        }
    }

    pub(crate) fn run_tracer(&self, obj: &T) -> Option<String> {
        self.tracer.as_ref().map(|f| f(obj))
    }

    pub(crate) fn run_stats(&self) -> HashMap<String, String> {
        self.stats.as_ref().map_or_else(HashMap::new, |f| f())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn empty_hooks_are_all_no_ops() {
        let hooks: Hooks<u32> = Hooks::new();
        hooks.run_opener(&1);
        assert!(hooks.run_getter(&1).is_ok());
        assert!(hooks.run_retter(&1).is_ok());
        hooks.run_closer(&1);
        assert!(hooks.run_health(&1));
        assert_eq!(hooks.run_tracer(&1), None);
        assert!(hooks.run_stats().is_empty());
    }

    #[test]
    fn hooks_are_invoked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let hooks = Hooks::<u32>::new()
            .opener(move |_| { c.fetch_add(1, Ordering::SeqCst); })
            .health(|v| *v % 2 == 0);
        hooks.run_opener(&42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(hooks.run_health(&4));
        assert!(!hooks.run_health(&5));
    }
}
