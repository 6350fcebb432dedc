//! Thread-safe handles.
//!
//! The handles in this module count with atomic operations, so clones may be
//! sent to and dropped on other threads. They are `Send + Sync` when
//! `T: Send + Sync`. Everything else about them, including the empty state
//! and the release protocol, is identical to the single-threaded
//! [`crate::Shared`] and [`crate::Weak`].
//!
//! # Examples
//!
//! ```
//! use rudo_rc::sync::Shared;
//!
//! let data = Shared::new(vec![1, 2, 3]);
//! let weak = Shared::downgrade(&data);
//!
//! let sum = std::thread::spawn({
//!     let data = Shared::clone(&data);
//!     move || data.iter().sum::<i32>()
//! });
//!
//! assert_eq!(sum.join().unwrap(), 6);
//! assert_eq!(Shared::use_count(&data), 1);
//! assert!(!weak.expired());
//! ```

use crate::count::Atomic;
use crate::ptr::{SharedHandle, WeakHandle};

/// A reference-counted owning pointer that may be shared across threads.
pub type Shared<T> = SharedHandle<T, Atomic>;

/// A weak observer of a [`Shared`] that may be shared across threads.
pub type Weak<T> = WeakHandle<T, Atomic>;

/// Allocate `value` behind a thread-safe [`Shared`].
pub fn make_shared<T>(value: T) -> Shared<T> {
    Shared::new(value)
}
