//! RAII handle returned by `Pool::acquire`.
//!
//! Copied near-verbatim from `nebula-resource/src/guard.rs`'s `Guard<T>`:
//! an `Option<T>` plus an `Option<FnOnce>` run on drop, with an
//! `into_inner()` escape hatch that disarms the callback.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// Wraps a checked-out resource. Dropping the guard runs the return
/// callback (recycle-or-retire into the originating pool); calling
/// [`Guard::into_inner`] takes ownership of the resource and skips it,
/// for callers who want to hand the resource off elsewhere.
pub struct Guard<T> {
    inner: Option<T>,
    on_drop: Option<Box<dyn FnOnce(T) + Send>>,
}

impl<T> Guard<T> {
    pub(crate) fn new(inner: T, on_drop: impl FnOnce(T) + Send + 'static) -> Self {
        Self { inner: Some(inner), on_drop: Some(Box::new(on_drop)) }
    }

    /// Take ownership of the resource, skipping the return-to-pool callback.
    ///
    /// The caller becomes responsible for the resource; the pool will never
    /// see it again (it is not decremented from `n_total` implicitly — the
    /// caller should not do this unless they intend to destroy the resource
    /// themselves or re-register it via some other path).
    #[must_use]
    pub fn into_inner(mut self) -> T {
        self.on_drop = None;
        self.inner.take().expect("guard inner is always Some until drop")
    }
}

impl<T> Deref for Guard<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref().expect("guard inner is always Some until drop")
    }
}

impl<T> DerefMut for Guard<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut().expect("guard inner is always Some until drop")
    }
}

impl<T> Drop for Guard<T> {
    fn drop(&mut self) {
        if let (Some(inner), Some(on_drop)) = (self.inner.take(), self.on_drop.take()) {
            on_drop(inner);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Guard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").field("inner", &self.inner).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn guard_derefs_to_inner() {
        let guard = Guard::new(42, |_| {});
        assert_eq!(*guard, 42);
    }

    #[test]
    fn guard_drop_fires_callback() {
        let fired = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&fired);
        {
            let _guard = Guard::new(1, move |_| f.store(true, Ordering::SeqCst));
        }
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn into_inner_prevents_callback() {
        let fired = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&fired);
        let guard = Guard::new(1, move |_| f.store(true, Ordering::SeqCst));
        let value = guard.into_inner();
        assert_eq!(value, 1);
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn guard_deref_mut() {
        let mut guard = Guard::new(vec![1, 2], |_| {});
        guard.push(3);
        assert_eq!(*guard, vec![1, 2, 3]);
    }
}
