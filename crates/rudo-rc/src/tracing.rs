//! Accounting tracing support.
//!
//! When the `tracing` feature is enabled, this module emits structured events
//! for the lifecycle of managed values and accounting blocks. Every event
//! carries the block address so that the events of one value can be
//! correlated.

#[cfg(feature = "tracing")]
pub mod internal {
    /// Log a freshly allocated accounting block.
    pub fn log_block_allocated(block: *const ()) {
        ::tracing::debug!(block = ?block, "block_allocated");
    }

    /// Log the destruction of a managed value (strong count reached zero).
    pub fn log_value_destroyed(block: *const (), weak_remaining: usize) {
        ::tracing::trace!(block = ?block, weak_remaining, "value_destroyed");
    }

    /// Log the reclamation of an accounting block (last handle gone).
    pub fn log_block_reclaimed(block: *const ()) {
        ::tracing::trace!(block = ?block, "block_reclaimed");
    }

    /// Log a weak handle that could not be promoted.
    pub fn log_promotion_failed(block: *const ()) {
        ::tracing::trace!(block = ?block, "promotion_failed");
    }
}

#[cfg(not(feature = "tracing"))]
pub mod internal {
    /// Stub function when tracing is disabled.
    #[inline]
    pub const fn log_block_allocated(_block: *const ()) {}

    /// Stub function when tracing is disabled.
    #[inline]
    pub const fn log_value_destroyed(_block: *const (), _weak_remaining: usize) {}

    /// Stub function when tracing is disabled.
    #[inline]
    pub const fn log_block_reclaimed(_block: *const ()) {}

    /// Stub function when tracing is disabled.
    #[inline]
    pub const fn log_promotion_failed(_block: *const ()) {}
}
