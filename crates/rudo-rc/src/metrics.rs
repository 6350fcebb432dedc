//! Reference counting metrics and statistics.
//!
//! Two views are kept:
//!
//! - a per-thread [`RcMetrics`] snapshot, updated on the thread where each
//!   event happens, available through [`thread_metrics`];
//! - process-level cumulative counters in [`GlobalMetrics`], available through
//!   [`global_metrics`].

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts of accounting events observed on one thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RcMetrics {
    /// Accounting blocks allocated (one per managed value).
    pub blocks_allocated: usize,
    /// Accounting blocks freed after their last handle went away.
    pub blocks_reclaimed: usize,
    /// Managed values destroyed because their strong count reached zero.
    pub values_destroyed: usize,
    /// Successful weak-to-shared promotions.
    pub promotions: usize,
    /// Promotions refused because the value was already destroyed.
    pub failed_promotions: usize,
}

impl RcMetrics {
    /// Create a new `RcMetrics` with all counters set to zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            blocks_allocated: 0,
            blocks_reclaimed: 0,
            values_destroyed: 0,
            promotions: 0,
            failed_promotions: 0,
        }
    }

    /// Blocks allocated but not yet reclaimed.
    ///
    /// Saturates at zero, since a block allocated on one thread may be
    /// reclaimed on another.
    #[must_use]
    pub const fn live_blocks(&self) -> usize {
        self.blocks_allocated.saturating_sub(self.blocks_reclaimed)
    }
}

thread_local! {
    static THREAD_METRICS: Cell<RcMetrics> = const { Cell::new(RcMetrics::new()) };
}

/// Get a snapshot of the metrics recorded on the current thread.
///
/// # Example
///
/// ```
/// use rudo_rc::{thread_metrics, Shared};
///
/// let before = thread_metrics();
/// drop(Shared::new(5));
/// let after = thread_metrics();
/// assert_eq!(after.values_destroyed, before.values_destroyed + 1);
/// ```
#[must_use]
pub fn thread_metrics() -> RcMetrics {
    THREAD_METRICS.try_with(Cell::get).unwrap_or_default()
}

/// Reset the current thread's metrics to zero.
pub fn reset_thread_metrics() {
    let _ = THREAD_METRICS.try_with(|m| m.set(RcMetrics::new()));
}

/// Process-level cumulative statistics.
///
/// # Example
///
/// ```
/// use rudo_rc::global_metrics;
///
/// let metrics = global_metrics();
/// println!("Blocks ever allocated: {}", metrics.total_blocks_allocated());
/// ```
#[derive(Debug)]
pub struct GlobalMetrics {
    blocks_allocated: AtomicUsize,
    blocks_reclaimed: AtomicUsize,
    values_destroyed: AtomicUsize,
    promotions: AtomicUsize,
    failed_promotions: AtomicUsize,
}

impl Default for GlobalMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalMetrics {
    /// Create a new `GlobalMetrics` with all counters initialized to zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            blocks_allocated: AtomicUsize::new(0),
            blocks_reclaimed: AtomicUsize::new(0),
            values_destroyed: AtomicUsize::new(0),
            promotions: AtomicUsize::new(0),
            failed_promotions: AtomicUsize::new(0),
        }
    }

    /// Returns the total number of accounting blocks allocated.
    #[inline]
    #[must_use]
    pub fn total_blocks_allocated(&self) -> usize {
        self.blocks_allocated.load(Ordering::Relaxed)
    }

    /// Returns the total number of accounting blocks reclaimed.
    #[inline]
    #[must_use]
    pub fn total_blocks_reclaimed(&self) -> usize {
        self.blocks_reclaimed.load(Ordering::Relaxed)
    }

    /// Returns the total number of managed values destroyed.
    #[inline]
    #[must_use]
    pub fn total_values_destroyed(&self) -> usize {
        self.values_destroyed.load(Ordering::Relaxed)
    }

    /// Returns the total number of successful promotions.
    #[inline]
    #[must_use]
    pub fn total_promotions(&self) -> usize {
        self.promotions.load(Ordering::Relaxed)
    }

    /// Returns the total number of refused promotions.
    #[inline]
    #[must_use]
    pub fn total_failed_promotions(&self) -> usize {
        self.failed_promotions.load(Ordering::Relaxed)
    }

    fn add(&self, delta: &RcMetrics) {
        self.blocks_allocated
            .fetch_add(delta.blocks_allocated, Ordering::Relaxed);
        self.blocks_reclaimed
            .fetch_add(delta.blocks_reclaimed, Ordering::Relaxed);
        self.values_destroyed
            .fetch_add(delta.values_destroyed, Ordering::Relaxed);
        self.promotions.fetch_add(delta.promotions, Ordering::Relaxed);
        self.failed_promotions
            .fetch_add(delta.failed_promotions, Ordering::Relaxed);
    }
}

static GLOBAL_METRICS: GlobalMetrics = GlobalMetrics::new();

/// Get the global cumulative metrics.
#[must_use]
pub fn global_metrics() -> &'static GlobalMetrics {
    &GLOBAL_METRICS
}

/// Record one event in both the thread-local and the global counters.
pub(crate) fn record(update: impl FnOnce(&mut RcMetrics)) {
    let mut delta = RcMetrics::new();
    update(&mut delta);
    GLOBAL_METRICS.add(&delta);
    // The thread-local may already be gone during thread teardown.
    let _ = THREAD_METRICS.try_with(|m| {
        let mut current = m.get();
        current.blocks_allocated += delta.blocks_allocated;
        current.blocks_reclaimed += delta.blocks_reclaimed;
        current.values_destroyed += delta.values_destroyed;
        current.promotions += delta.promotions;
        current.failed_promotions += delta.failed_promotions;
        m.set(current);
    });
}
