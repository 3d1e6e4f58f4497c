//! Interior-mutability wrapper for the process-wide allocator singleton.
//!
//! The allocator is single-threaded by design: every public call runs to
//! completion before the next begins, so a plain `UnsafeCell` wrapper is
//! sufficient as the single exclusive-access boundary around the shared
//! `Heap` state. This is not a lock in the blocking sense — it is the only
//! boundary this crate needs, nothing more.

use std::cell::UnsafeCell;

pub(crate) struct Locked<T> {
    inner: UnsafeCell<T>,
}

// Safety: access is only ever exclusive-in-practice because the allocator
// is single-threaded; making this genuinely thread-safe is out of scope.
unsafe impl<T> Sync for Locked<T> {}

impl<T> Locked<T> {
    pub(crate) const fn new(inner: T) -> Self {
        Self {
            inner: UnsafeCell::new(inner),
        }
    }

    #[allow(clippy::mut_from_ref)]
    pub(crate) fn lock(&self) -> &mut T {
        unsafe { &mut *self.inner.get() }
    }
}
