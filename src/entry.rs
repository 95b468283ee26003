//! A single pool-managed resource and its bookkeeping.

use std::time::Instant;

/// Lifecycle state of a [`Entry`], mirroring the pool's state machine:
/// `∅ → Available → InUse → (Available | Retiring) → ∅`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Sitting in the pool, ready to be handed out.
    Available,
    /// Checked out to a holder.
    InUse,
    /// Marked for destruction; no longer reachable from `avail` or `busy`.
    Retiring,
}

/// Identifies who currently holds a resource (a scope key, see [`crate::proxy::Scope`]).
pub type HolderId = Option<u64>;

/// One resource instance plus the bookkeeping spec.md §3 requires of every
/// live entry.
///
/// `obj` is `Option<T>` so that a checked-out entry can stay registered in
/// `busy` (carrying its id/holder/uses/timestamps) while the object itself
/// is loaned out to the caller via a [`crate::guard::Guard`]; it is put
/// back with [`Entry::restore`] when the guard is dropped.
#[derive(Debug)]
pub struct Entry<T> {
    pub(crate) obj: Option<T>,
    pub(crate) id: u64,
    pub(crate) created_at: Instant,
    pub(crate) last_ret_at: Option<Instant>,
    pub(crate) last_get_at: Option<Instant>,
    pub(crate) uses: u64,
    pub(crate) holder: HolderId,
    pub(crate) state: State,
    pub(crate) trace: Option<String>,
}

impl<T> Entry<T> {
    /// A freshly constructed entry, not yet handed to any caller.
    ///
    /// `last_ret_at` is set equal to `created_at`: a top-up that has never
    /// been used is, for idle-eviction purposes, exactly as old as its
    /// return timestamp would suggest (spec.md §3 invariant 5).
    pub(crate) fn new(id: u64, obj: T) -> Self {
        let now = Instant::now();
        Self {
            obj: Some(obj),
            id,
            created_at: now,
            last_ret_at: Some(now),
            last_get_at: None,
            uses: 0,
            holder: None,
            state: State::Available,
            trace: None,
        }
    }

    pub(crate) fn mark_acquired(&mut self, holder: u64) {
        self.state = State::InUse;
        self.holder = Some(holder);
        self.last_get_at = Some(Instant::now());
        self.uses += 1;
    }

    pub(crate) fn mark_returned(&mut self) {
        self.state = State::Available;
        self.holder = None;
        self.last_ret_at = Some(Instant::now());
    }

    pub(crate) fn idle_for(&self) -> std::time::Duration {
        self.last_ret_at.map_or(std::time::Duration::ZERO, |t| t.elapsed())
    }

    pub(crate) fn held_for(&self) -> std::time::Duration {
        self.last_get_at.map_or(std::time::Duration::ZERO, |t| t.elapsed())
    }

    /// Take the object out, leaving the entry's bookkeeping behind.
    pub(crate) fn take(&mut self) -> T {
        self.obj.take().expect("entry object taken twice")
    }

    /// Put a returned object back into its entry.
    pub(crate) fn restore(&mut self, obj: T) {
        self.obj = Some(obj);
    }

    pub(crate) fn obj_ref(&self) -> &T {
        self.obj.as_ref().expect("entry object missing while checked out")
    }
}
