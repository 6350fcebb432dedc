//! Counter flavors for the accounting block.
//!
//! Every handle type is generic over a [`Count`] implementation which decides
//! how the strong, weak and handle counters are mutated:
//!
//! - [`Local`] uses plain `Cell<usize>` read/modify/write. Handles built on it
//!   are `!Send` and `!Sync`, so they cannot be shared across threads.
//! - [`Atomic`] uses `AtomicUsize`. Handles built on it are `Send + Sync` when
//!   the value is.
//!
//! The trait is sealed; the two flavors above are the only implementations.

use std::cell::Cell;
use std::sync::atomic::{self, AtomicUsize, Ordering};

mod private {
    pub trait Sealed {}
}

/// Counter storage used by the accounting block.
///
/// This trait is sealed and cannot be implemented outside of this crate.
pub trait Count: private::Sealed + Sized + 'static {
    /// Create a counter holding `value`.
    #[doc(hidden)]
    fn with_value(value: usize) -> Self;

    /// Read the current value.
    #[doc(hidden)]
    fn get(&self) -> usize;

    /// Add one. Aborts the process on overflow.
    #[doc(hidden)]
    fn increment(&self);

    /// Subtract one and return the value held *before* the decrement.
    ///
    /// A return value of `1` means the caller observed the transition to zero
    /// and must call [`Count::acquire_fence`] before touching the guarded data.
    #[doc(hidden)]
    fn decrement(&self) -> usize;

    /// Add one unless the counter is zero. Returns whether it was incremented.
    #[doc(hidden)]
    fn increment_if_nonzero(&self) -> bool;

    /// Move the counter from exactly one to zero. Returns whether it did.
    #[doc(hidden)]
    fn claim_unique(&self) -> bool;

    /// Move the counter from zero to the locked sentinel. Returns whether it
    /// did.
    ///
    /// While locked, [`Count::increment_unless_locked`] waits and
    /// [`Count::get`] reports `usize::MAX`.
    #[doc(hidden)]
    fn lock_if_zero(&self) -> bool;

    /// Return a counter taken by [`Count::lock_if_zero`] to zero.
    #[doc(hidden)]
    fn unlock(&self);

    /// Add one, waiting for a concurrent [`Count::lock_if_zero`] holder to
    /// unlock first. Aborts the process on overflow.
    #[doc(hidden)]
    fn increment_unless_locked(&self);

    /// Synchronize with every prior decrement before releasing memory.
    #[doc(hidden)]
    fn acquire_fence();
}

/// Sentinel held by a counter between `lock_if_zero` and `unlock`.
pub(crate) const LOCKED: usize = usize::MAX;

/// Upper bound before a counter is considered overflowed.
///
/// Kept well below `usize::MAX` so that racing atomic increments cannot wrap
/// before one of them notices.
const MAX_COUNT: usize = isize::MAX as usize;

#[cold]
#[inline(never)]
fn count_overflow() -> ! {
    std::process::abort()
}

// ============================================================================
// Local - single-threaded counters
// ============================================================================

/// Non-atomic counters for single-threaded use.
///
/// This is the default flavor of [`Shared`](crate::Shared) and
/// [`Weak`](crate::Weak).
#[derive(Debug)]
pub struct Local(Cell<usize>);

impl private::Sealed for Local {}

impl Count for Local {
    #[inline]
    fn with_value(value: usize) -> Self {
        Self(Cell::new(value))
    }

    #[inline]
    fn get(&self) -> usize {
        self.0.get()
    }

    #[inline]
    fn increment(&self) {
        let count = self.0.get();
        if count >= MAX_COUNT {
            count_overflow();
        }
        self.0.set(count + 1);
    }

    #[inline]
    fn decrement(&self) -> usize {
        let count = self.0.get();
        debug_assert!(count > 0, "decremented a counter that is already zero");
        self.0.set(count - 1);
        count
    }

    #[inline]
    fn increment_if_nonzero(&self) -> bool {
        match self.0.get() {
            0 => false,
            _ => {
                self.increment();
                true
            }
        }
    }

    #[inline]
    fn claim_unique(&self) -> bool {
        if self.0.get() == 1 {
            self.0.set(0);
            true
        } else {
            false
        }
    }

    #[inline]
    fn lock_if_zero(&self) -> bool {
        if self.0.get() == 0 {
            self.0.set(LOCKED);
            true
        } else {
            false
        }
    }

    #[inline]
    fn unlock(&self) {
        debug_assert_eq!(self.0.get(), LOCKED);
        self.0.set(0);
    }

    /// A single thread cannot observe its own lock outside `get_mut`.
    #[inline]
    fn increment_unless_locked(&self) {
        debug_assert_ne!(self.0.get(), LOCKED);
        self.increment();
    }

    #[inline]
    fn acquire_fence() {}
}

// ============================================================================
// Atomic - thread-safe counters
// ============================================================================

/// Atomic counters for handles shared between threads.
///
/// See [`crate::sync`] for the handle aliases built on this flavor.
#[derive(Debug)]
pub struct Atomic(AtomicUsize);

impl private::Sealed for Atomic {}

impl Count for Atomic {
    #[inline]
    fn with_value(value: usize) -> Self {
        Self(AtomicUsize::new(value))
    }

    /// Uses Acquire ordering so a reader that sees zero also sees the effects
    /// of the decrement that produced it.
    #[inline]
    fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Relaxed: a new reference can only be made from an existing one, which
    /// already provides the needed synchronization.
    #[inline]
    fn increment(&self) {
        let old = self.0.fetch_add(1, Ordering::Relaxed);
        if old >= MAX_COUNT {
            count_overflow();
        }
    }

    #[inline]
    fn decrement(&self) -> usize {
        self.0.fetch_sub(1, Ordering::Release)
    }

    #[inline]
    fn increment_if_nonzero(&self) -> bool {
        self.0
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |count| {
                if count == 0 {
                    None
                } else if count >= MAX_COUNT {
                    count_overflow()
                } else {
                    Some(count + 1)
                }
            })
            .is_ok()
    }

    #[inline]
    fn claim_unique(&self) -> bool {
        self.0
            .compare_exchange(1, 0, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Acquire on success: a zero read here must see everything done by the
    /// handles whose release produced it.
    #[inline]
    fn lock_if_zero(&self) -> bool {
        self.0
            .compare_exchange(0, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    fn unlock(&self) {
        self.0.store(0, Ordering::Release);
    }

    #[inline]
    fn increment_unless_locked(&self) {
        let mut count = self.0.load(Ordering::Relaxed);
        loop {
            if count == LOCKED {
                std::hint::spin_loop();
                count = self.0.load(Ordering::Relaxed);
                continue;
            }
            if count >= MAX_COUNT {
                count_overflow();
            }
            match self.0.compare_exchange_weak(
                count,
                count + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => count = current,
            }
        }
    }

    #[inline]
    fn acquire_fence() {
        atomic::fence(Ordering::Acquire);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise<C: Count>() {
        let count = C::with_value(1);
        count.increment();
        assert_eq!(count.get(), 2);
        assert_eq!(count.decrement(), 2);
        assert!(count.claim_unique());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_local_and_atomic_agree() {
        exercise::<Local>();
        exercise::<Atomic>();
    }

    #[test]
    fn test_increment_if_nonzero() {
        let live = Local::with_value(1);
        assert!(live.increment_if_nonzero());
        assert_eq!(live.get(), 2);

        let dead = Atomic::with_value(0);
        assert!(!dead.increment_if_nonzero());
        assert_eq!(dead.get(), 0);
    }

    #[test]
    fn test_decrement_reports_previous_value() {
        let count = Atomic::with_value(1);
        assert_eq!(count.decrement(), 1);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_claim_unique() {
        let count = Local::with_value(2);
        assert!(!count.claim_unique());
        count.decrement();
        assert!(count.claim_unique());
        assert_eq!(count.get(), 0);

        let count = Atomic::with_value(1);
        assert!(count.claim_unique());
        assert!(!count.claim_unique());
    }

    fn exercise_lock<C: Count>() {
        let count = C::with_value(1);
        assert!(!count.lock_if_zero());
        assert_eq!(count.decrement(), 1);

        assert!(count.lock_if_zero());
        assert_eq!(count.get(), LOCKED);
        assert!(!count.lock_if_zero());
        count.unlock();
        assert_eq!(count.get(), 0);

        count.increment_unless_locked();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_lock_if_zero() {
        exercise_lock::<Local>();
        exercise_lock::<Atomic>();
    }

    #[test]
    fn test_increment_waits_for_unlock() {
        let count = std::sync::Arc::new(Atomic::with_value(0));
        assert!(count.lock_if_zero());

        let waiter = std::thread::spawn({
            let count = std::sync::Arc::clone(&count);
            move || count.increment_unless_locked()
        });
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(count.get(), LOCKED);

        count.unlock();
        waiter.join().unwrap();
        assert_eq!(count.get(), 1);
    }
}
