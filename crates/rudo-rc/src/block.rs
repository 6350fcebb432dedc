//! The accounting block shared by every handle to one managed value.

use std::ptr::NonNull;

use crate::count::{Count, LOCKED};
use crate::metrics;
use crate::tracing::internal as trace;

/// Strong, weak and handle counters for one managed value.
///
/// The value itself lives in a separate `Box<T>` allocation. The block is
/// reference counted by `handles`, which is always `strong + weak`, so it is
/// freed exactly once, by whichever handle of either kind goes last.
pub struct Accounting<C: Count> {
    /// Live `Shared` handles. The value is alive iff this is non-zero.
    strong: C,
    /// Live `Weak` handles.
    weak: C,
    /// Every live handle, strong or weak.
    handles: C,
}

impl<C: Count> Accounting<C> {
    /// Allocate a block owned by a single new strong handle.
    pub(crate) fn allocate() -> NonNull<Self> {
        let block = NonNull::from(Box::leak(Box::new(Self {
            strong: C::with_value(1),
            weak: C::with_value(0),
            handles: C::with_value(1),
        })));
        metrics::record(|m| m.blocks_allocated += 1);
        trace::log_block_allocated(block.as_ptr().cast::<()>());
        block
    }

    /// Number of live strong handles.
    #[inline]
    pub(crate) fn strong_count(&self) -> usize {
        self.strong.get()
    }

    /// Number of live weak handles.
    ///
    /// Reads as zero while [`Accounting::is_unique`] holds the weak counter.
    #[inline]
    pub(crate) fn weak_count(&self) -> usize {
        match self.weak.get() {
            LOCKED => 0,
            count => count,
        }
    }

    /// Register one more strong handle. The caller must already own one.
    #[inline]
    pub(crate) fn retain_strong(&self) {
        self.handles.increment();
        self.strong.increment();
    }

    /// Register a strong handle on behalf of a weak one, unless the value is
    /// already gone.
    ///
    /// The caller must own a weak handle, which keeps `handles` above zero for
    /// the duration of the call.
    pub(crate) fn try_retain_strong(&self) -> bool {
        self.handles.increment();
        if self.strong.increment_if_nonzero() {
            metrics::record(|m| m.promotions += 1);
            true
        } else {
            self.handles.decrement();
            metrics::record(|m| m.failed_promotions += 1);
            trace::log_promotion_failed(std::ptr::from_ref(self).cast::<()>());
            false
        }
    }

    /// Register one more weak handle. The caller must own a handle.
    ///
    /// Waits while another thread is inside [`Accounting::is_unique`].
    #[inline]
    pub(crate) fn retain_weak(&self) {
        self.handles.increment();
        self.weak.increment_unless_locked();
    }

    /// Returns `true` if the caller's strong handle is the only handle of
    /// either kind.
    ///
    /// The weak counter is locked at zero while the strong count is read. No
    /// weak handle can then be created, and none exists to promote, so a
    /// strong count of one cannot grow behind the caller's back.
    pub(crate) fn is_unique(&self) -> bool {
        if !self.weak.lock_if_zero() {
            return false;
        }
        let unique = self.strong.get() == 1;
        self.weak.unlock();
        unique
    }

    /// Drop one strong reference.
    ///
    /// Returns `true` when this was the last one; the caller must then destroy
    /// the managed value and afterwards call [`Accounting::release_handle`].
    #[inline]
    pub(crate) fn release_strong(&self) -> bool {
        if self.strong.decrement() == 1 {
            C::acquire_fence();
            true
        } else {
            false
        }
    }

    /// Take the sole strong reference away, leaving `strong` at zero.
    ///
    /// Fails when other strong handles exist.
    #[inline]
    pub(crate) fn claim_unique_strong(&self) -> bool {
        self.strong.claim_unique()
    }

    /// Drop one weak reference. Must be followed by [`Accounting::release_handle`].
    #[inline]
    pub(crate) fn release_weak(&self) {
        self.weak.decrement();
    }

    /// Drop the calling handle's share of the block, freeing it if it was the
    /// last.
    ///
    /// Takes a raw pointer because the block may be deallocated before the
    /// function returns.
    ///
    /// # Safety
    ///
    /// `this` must point to a live block and the caller must own one of its
    /// handle references, which is consumed by this call.
    pub(crate) unsafe fn release_handle(this: NonNull<Self>) {
        // SAFETY: the caller's handle reference keeps the block alive here.
        let last = unsafe { this.as_ref() }.handles.decrement() == 1;
        if !last {
            return;
        }
        C::acquire_fence();
        // SAFETY: no handle refers to the block any more.
        let block = unsafe { Box::from_raw(this.as_ptr()) };
        debug_assert_eq!(block.strong.get(), 0);
        debug_assert_eq!(block.weak.get(), 0);
        drop(block);
        metrics::record(|m| m.blocks_reclaimed += 1);
        trace::log_block_reclaimed(this.as_ptr().cast::<()>());
    }
}

impl<C: Count> std::fmt::Debug for Accounting<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accounting")
            .field("strong", &self.strong.get())
            .field("weak", &self.weak.get())
            .finish()
    }
}
