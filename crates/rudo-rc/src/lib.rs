//! Reference-counted shared and weak handles for Rust.
//!
//! `rudo-rc` provides counted ownership over a heap value:
//!
//! - [`Shared<T>`]: a strong handle. Every clone co-owns the value; the value
//!   is destroyed when the last one is dropped or reset.
//! - [`Weak<T>`]: an observer that never keeps the value alive, and can be
//!   promoted back to a `Shared` with [`Weak::lock`] while the value exists.
//! - [`Unique<T>`]: a move-only exclusive owner.
//!
//! All handles may be *empty*. Dereferencing an empty handle panics, so the
//! checked accessors (`Shared::get`, `Unique::get`) should be preferred when
//! emptiness is possible.
//!
//! # Accounting
//!
//! Each managed value has one accounting block holding its strong and weak
//! counts. The value is freed when the strong count reaches zero; the block is
//! freed once both counts are zero, by whichever handle goes last.
//!
//! # Quick Start
//!
//! ```
//! use rudo_rc::{make_shared, Shared, Weak};
//!
//! let s1 = make_shared(String::from("value"));
//! let s2 = Shared::clone(&s1);
//! let w = Weak::from(&s1);
//!
//! assert_eq!(Shared::use_count(&s1), 2);
//! assert_eq!(w.use_count(), 2);
//! assert!(!w.expired());
//!
//! drop(s1);
//! drop(s2);
//! assert!(w.expired());
//! ```
//!
//! # Cycles
//!
//! Strong cycles are never collected. Break them by making one direction of
//! every cycle a `Weak`:
//!
//! ```
//! use rudo_rc::{Shared, Weak};
//! use std::cell::RefCell;
//!
//! struct Parent {
//!     child: RefCell<Shared<Child>>,
//! }
//!
//! struct Child {
//!     parent: RefCell<Weak<Parent>>,
//! }
//!
//! let parent = Shared::new(Parent { child: RefCell::default() });
//! let child = Shared::new(Child { parent: RefCell::default() });
//! *parent.child.borrow_mut() = Shared::clone(&child);
//! child.parent.borrow_mut().assign(&parent);
//!
//! let observer = Shared::downgrade(&child);
//! drop(child);
//! drop(parent);
//! assert!(observer.expired());
//! ```
//!
//! # Thread Safety
//!
//! [`Shared`] and [`Weak`] count without synchronization and are `!Send` and
//! `!Sync`. Use [`sync::Shared`] and [`sync::Weak`], which count atomically,
//! to share a value between threads.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod block;
pub mod count;
mod metrics;
mod ptr;
pub mod sync;
mod tracing;
mod unique;

// Re-export public API
pub use count::{Atomic, Count, Local};
pub use metrics::{global_metrics, reset_thread_metrics, thread_metrics, GlobalMetrics, RcMetrics};
pub use ptr::{Expired, SharedHandle, WeakHandle};
pub use unique::Unique;

/// A single-threaded reference-counted owning pointer.
pub type Shared<T> = SharedHandle<T, Local>;

/// A single-threaded weak observer of a [`Shared`].
pub type Weak<T> = WeakHandle<T, Local>;

/// Allocate `value` behind a single-threaded [`Shared`].
///
/// Equivalent to [`Shared::new`].
pub fn make_shared<T>(value: T) -> Shared<T> {
    Shared::new(value)
}

/// Allocate `value` behind a [`Unique`].
///
/// Equivalent to [`Unique::new`].
pub fn make_unique<T>(value: T) -> Unique<T> {
    Unique::new(value)
}
