//! The `SharedHandle<T>` and `WeakHandle<T>` smart pointers.
//!
//! This module provides the reference-counted handle types. Most code uses
//! them through the [`Shared`](crate::Shared) / [`Weak`](crate::Weak) aliases
//! (single-threaded) or [`sync::Shared`](crate::sync::Shared) /
//! [`sync::Weak`](crate::sync::Weak) (thread-safe).

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::block::Accounting;
use crate::count::{Atomic, Count};
use crate::metrics;
use crate::tracing::internal as trace;
use crate::unique::Unique;

// ============================================================================
// Raw - the (value, block) pair named by a non-empty handle
// ============================================================================

/// Pointers held by every non-empty handle.
struct Raw<T: ?Sized, C: Count> {
    /// The managed value, leaked from a `Box<T>`.
    value: NonNull<T>,
    /// The accounting block shared by all handles to `value`.
    block: NonNull<Accounting<C>>,
}

impl<T: ?Sized, C: Count> Clone for Raw<T, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized, C: Count> Copy for Raw<T, C> {}

impl<T: ?Sized, C: Count> Raw<T, C> {
    /// Borrow the accounting block.
    ///
    /// Valid as long as the handle holding this `Raw` is alive.
    #[inline]
    fn counts(&self) -> &Accounting<C> {
        // SAFETY: every live handle owns one `handles` reference on the block.
        unsafe { self.block.as_ref() }
    }

    #[inline]
    fn block_addr(&self) -> *const () {
        self.block.as_ptr().cast::<()>()
    }
}

/// Identity of the accounting block named by a handle, `None` when empty.
#[inline]
fn block_of<T: ?Sized, C: Count>(raw: Option<&Raw<T, C>>) -> Option<NonNull<Accounting<C>>> {
    raw.map(|raw| raw.block)
}

// ============================================================================
// SharedHandle<T, C> - strong, reference-counted ownership
// ============================================================================

/// A reference-counted owning pointer to a value of type `T`.
///
/// Every clone co-owns the value and shares one accounting block with the
/// others. The value is destroyed when the last `SharedHandle` to it is
/// dropped or reset; [`WeakHandle`]s that observe it then report
/// [`expired`](WeakHandle::expired).
///
/// A handle may also be *empty*, owning nothing, as produced by
/// [`SharedHandle::empty`], [`SharedHandle::reset`] or a failed
/// [`WeakHandle::lock`].
///
/// Like `Rc<T>`, the operations are associated functions (`Shared::use_count(&s)`)
/// so that they never shadow methods of `T` reached through `Deref`.
///
/// # Panics
///
/// Dereferencing an empty handle panics. Use [`SharedHandle::get`] for
/// checked access.
///
/// # Examples
///
/// ```
/// use rudo_rc::Shared;
///
/// let a = Shared::new(String::from("hello"));
/// let b = Shared::clone(&a);
/// assert_eq!(Shared::use_count(&a), 2);
/// assert_eq!(b.len(), 5);
///
/// drop(a);
/// assert_eq!(Shared::use_count(&b), 1);
/// ```
pub struct SharedHandle<T: ?Sized, C: Count = crate::count::Local> {
    raw: Option<Raw<T, C>>,
    /// The handle logically owns a `T`.
    _marker: PhantomData<T>,
}

impl<T, C: Count> SharedHandle<T, C> {
    /// Allocate `value` and return its first owner.
    ///
    /// Equivalent to `Shared::from_box(Box::new(value))`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rudo_rc::Shared;
    ///
    /// let x = Shared::new(42);
    /// assert_eq!(*x, 42);
    /// assert_eq!(Shared::use_count(&x), 1);
    /// ```
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Move the value out if this is its only strong owner.
    ///
    /// Weak handles still observing the value become expired. Otherwise the
    /// handle is returned unchanged in `Err`, which is also what happens to an
    /// empty handle.
    ///
    /// # Errors
    ///
    /// Returns `Err(this)` when the handle is empty or other strong owners
    /// exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use rudo_rc::Shared;
    ///
    /// let a = Shared::new(3);
    /// let b = Shared::clone(&a);
    /// let a = Shared::try_unwrap(a).unwrap_err();
    /// drop(b);
    /// assert_eq!(Shared::try_unwrap(a), Ok(3));
    /// ```
    pub fn try_unwrap(this: Self) -> Result<T, Self> {
        let Some(raw) = this.raw else {
            return Err(this);
        };
        if !raw.counts().claim_unique_strong() {
            return Err(this);
        }
        std::mem::forget(this);

        // SAFETY: strong went from one to zero here, so nobody else can reach
        // the value, and it was leaked from a `Box<T>` in `from_box`.
        let value = unsafe { *Box::from_raw(raw.value.as_ptr()) };
        // SAFETY: `this` owned one handle reference and was forgotten.
        unsafe { Accounting::release_handle(raw.block) };
        Ok(value)
    }

    /// Get a raw pointer to the value, or null if the handle is empty.
    #[must_use]
    pub fn as_ptr(this: &Self) -> *const T {
        this.raw
            .map_or(std::ptr::null(), |raw| raw.value.as_ptr().cast_const())
    }
}

impl<T: ?Sized, C: Count> SharedHandle<T, C> {
    /// Create an empty handle that owns nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            raw: None,
            _marker: PhantomData,
        }
    }

    /// Take ownership of a boxed value and allocate its accounting block.
    ///
    /// The new handle is the sole owner: `use_count` is 1 and there are no
    /// weak handles yet.
    #[must_use]
    pub fn from_box(value: Box<T>) -> Self {
        let value = NonNull::from(Box::leak(value));
        Self {
            raw: Some(Raw {
                value,
                block: Accounting::allocate(),
            }),
            _marker: PhantomData,
        }
    }

    /// Take ownership of a raw owning pointer.
    ///
    /// A null pointer produces an empty handle.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from [`Box::into_raw`] (or equivalent) and
    /// must not be owned by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        match NonNull::new(ptr) {
            // SAFETY: guaranteed by the caller.
            Some(ptr) => Self::from_box(unsafe { Box::from_raw(ptr.as_ptr()) }),
            None => Self::empty(),
        }
    }

    /// Adopt a strong reference that was already registered on the block.
    const fn adopt(raw: Raw<T, C>) -> Self {
        Self {
            raw: Some(raw),
            _marker: PhantomData,
        }
    }

    /// Returns `true` if the handle owns nothing.
    ///
    /// This is the negation of the handle's boolean state: a handle is
    /// "true" iff it holds a value.
    #[must_use]
    pub const fn is_empty(this: &Self) -> bool {
        this.raw.is_none()
    }

    /// Number of strong handles sharing the value, or 0 for an empty handle.
    #[must_use]
    pub fn use_count(this: &Self) -> usize {
        this.raw.map_or(0, |raw| raw.counts().strong_count())
    }

    /// Number of weak handles observing the value, or 0 for an empty handle.
    #[must_use]
    pub fn weak_count(this: &Self) -> usize {
        this.raw.map_or(0, |raw| raw.counts().weak_count())
    }

    /// Borrow the value, or `None` if the handle is empty.
    #[must_use]
    pub fn get(this: &Self) -> Option<&T> {
        // SAFETY: a non-empty strong handle keeps the value alive.
        this.raw.as_ref().map(|raw| unsafe { raw.value.as_ref() })
    }

    /// Mutably borrow the value if no other handle, strong or weak, can reach
    /// it.
    ///
    /// # Examples
    ///
    /// ```
    /// use rudo_rc::Shared;
    ///
    /// let mut x = Shared::new(1);
    /// *Shared::get_mut(&mut x).unwrap() += 1;
    ///
    /// let weak = Shared::downgrade(&x);
    /// assert!(Shared::get_mut(&mut x).is_none());
    /// drop(weak);
    /// assert_eq!(*x, 2);
    /// ```
    #[must_use]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        let raw = this.raw?;
        if raw.counts().is_unique() {
            // SAFETY: `this` is the only handle and is borrowed mutably.
            Some(unsafe { &mut *raw.value.as_ptr() })
        } else {
            None
        }
    }

    /// Create a weak handle observing the same value.
    ///
    /// Downgrading an empty handle gives an empty weak handle.
    #[must_use]
    pub fn downgrade(this: &Self) -> WeakHandle<T, C> {
        if let Some(raw) = this.raw {
            raw.counts().retain_weak();
        }
        WeakHandle { raw: this.raw }
    }

    /// Returns `true` if both handles share one accounting block.
    ///
    /// Two empty handles are considered equal.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        block_of(this.raw.as_ref()) == block_of(other.raw.as_ref())
    }

    /// Release ownership and leave the handle empty.
    ///
    /// Resetting an empty handle does nothing.
    pub fn reset(this: &mut Self) {
        this.release();
    }

    /// Release ownership, then take ownership of `value` as a fresh owner.
    pub fn reset_with(this: &mut Self, value: Box<T>) {
        this.release();
        *this = Self::from_box(value);
    }

    /// The release protocol shared by `Drop` and `reset`.
    fn release(&mut self) {
        let Some(raw) = self.raw.take() else {
            return;
        };

        if raw.counts().release_strong() {
            let weak_remaining = raw.counts().weak_count();
            // SAFETY: this was the last strong handle and the value was
            // leaked from a `Box<T>` in `from_box`.
            unsafe { drop(Box::from_raw(raw.value.as_ptr())) };
            metrics::record(|m| m.values_destroyed += 1);
            trace::log_value_destroyed(raw.block_addr(), weak_remaining);
        }

        // SAFETY: this handle owned one handle reference on the block.
        unsafe { Accounting::release_handle(raw.block) };
    }
}

impl<T: ?Sized, C: Count> Deref for SharedHandle<T, C> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match self.raw {
            // SAFETY: a non-empty strong handle keeps the value alive.
            Some(raw) => unsafe { raw.value.as_ref() },
            None => panic!("attempted to dereference an empty Shared handle"),
        }
    }
}

impl<T: ?Sized, C: Count> Clone for SharedHandle<T, C> {
    fn clone(&self) -> Self {
        if let Some(raw) = self.raw {
            raw.counts().retain_strong();
        }
        Self {
            raw: self.raw,
            _marker: PhantomData,
        }
    }

    /// Aliasing the block this handle already names is a no-op.
    fn clone_from(&mut self, source: &Self) {
        if Self::ptr_eq(self, source) {
            return;
        }
        *self = source.clone();
    }
}

impl<T: ?Sized, C: Count> Drop for SharedHandle<T, C> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: ?Sized, C: Count> Default for SharedHandle<T, C> {
    /// Constructs an empty handle.
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized + fmt::Debug, C: Count> fmt::Debug for SharedHandle<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(value) => f.debug_tuple("Shared").field(&value).finish(),
            None => write!(f, "Shared(<empty>)"),
        }
    }
}

impl<T: ?Sized + fmt::Display, C: Count> fmt::Display for SharedHandle<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("<empty>"),
        }
    }
}

impl<T: ?Sized, C: Count> fmt::Pointer for SharedHandle<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ptr = self
            .raw
            .map_or(std::ptr::null(), |raw| raw.value.as_ptr().cast_const().cast::<()>());
        fmt::Pointer::fmt(&ptr, f)
    }
}

impl<T: ?Sized + PartialEq, C: Count> PartialEq for SharedHandle<T, C> {
    fn eq(&self, other: &Self) -> bool {
        Self::get(self) == Self::get(other)
    }
}

impl<T: ?Sized + Eq, C: Count> Eq for SharedHandle<T, C> {}

impl<T: ?Sized + std::hash::Hash, C: Count> std::hash::Hash for SharedHandle<T, C> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Self::get(self).hash(state);
    }
}

impl<T, C: Count> From<T> for SharedHandle<T, C> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized, C: Count> From<Box<T>> for SharedHandle<T, C> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized, C: Count> From<Option<Box<T>>> for SharedHandle<T, C> {
    /// `None` gives an empty handle.
    fn from(value: Option<Box<T>>) -> Self {
        value.map_or_else(Self::empty, Self::from_box)
    }
}

impl<T: ?Sized, C: Count> From<Unique<T>> for SharedHandle<T, C> {
    /// Moves an exclusively owned value into shared ownership.
    fn from(mut value: Unique<T>) -> Self {
        Self::from(Unique::release(&mut value))
    }
}

impl<T: ?Sized, C: Count> AsRef<T> for SharedHandle<T, C> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized, C: Count> std::borrow::Borrow<T> for SharedHandle<T, C> {
    fn borrow(&self) -> &T {
        self
    }
}

impl<T: ?Sized, C: Count> TryFrom<&WeakHandle<T, C>> for SharedHandle<T, C> {
    type Error = Expired;

    /// Promotion that reports an expired handle as an error instead of
    /// returning an empty `Shared`.
    fn try_from(weak: &WeakHandle<T, C>) -> Result<Self, Self::Error> {
        weak.upgrade().ok_or(Expired)
    }
}

// ============================================================================
// WeakHandle<T, C> - non-owning observer
// ============================================================================

/// A non-owning observer of a value owned by [`SharedHandle`]s.
///
/// A weak handle keeps the accounting block alive but never the value. Use
/// [`lock`](Self::lock) or [`upgrade`](Self::upgrade) to get temporary
/// ownership while the value still exists.
///
/// # Examples
///
/// ```
/// use rudo_rc::{Shared, Weak};
///
/// let strong = Shared::new(42);
/// let weak = Weak::from(&strong);
/// assert!(!weak.expired());
/// assert_eq!(*weak.lock(), 42);
///
/// drop(strong);
/// assert!(weak.expired());
/// assert!(Shared::is_empty(&weak.lock()));
/// ```
pub struct WeakHandle<T: ?Sized, C: Count = crate::count::Local> {
    raw: Option<Raw<T, C>>,
}

impl<T: ?Sized, C: Count> WeakHandle<T, C> {
    /// Create an empty weak handle that observes nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self { raw: None }
    }

    /// Number of strong handles to the observed value.
    ///
    /// Returns 0 once the value has been destroyed, or for an empty handle.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.counts().strong_count())
    }

    /// Number of weak handles to the observed value, including this one.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.counts().weak_count())
    }

    /// Returns `true` if the observed value is gone (or was never there).
    #[must_use]
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Promote to a strong handle, or `None` if the value is gone.
    ///
    /// The liveness check and the increment happen as one step, so an
    /// expired value can never be resurrected.
    #[must_use]
    pub fn upgrade(&self) -> Option<SharedHandle<T, C>> {
        let raw = self.raw?;
        if raw.counts().try_retain_strong() {
            Some(SharedHandle::adopt(raw))
        } else {
            None
        }
    }

    /// Promote to a strong handle, or get an empty one if the value is gone.
    ///
    /// # Examples
    ///
    /// ```
    /// use rudo_rc::Shared;
    ///
    /// let strong = Shared::new(5);
    /// let weak = Shared::downgrade(&strong);
    ///
    /// let locked = weak.lock();
    /// assert_eq!(Shared::use_count(&locked), 2);
    /// drop(locked);
    /// assert_eq!(Shared::use_count(&strong), 1);
    /// ```
    #[must_use]
    pub fn lock(&self) -> SharedHandle<T, C> {
        self.upgrade().unwrap_or_default()
    }

    /// Stop observing and leave the handle empty.
    ///
    /// Resetting an empty handle does nothing.
    pub fn reset(&mut self) {
        let Some(raw) = self.raw.take() else {
            return;
        };
        raw.counts().release_weak();
        // SAFETY: this handle owned one handle reference on the block.
        unsafe { Accounting::release_handle(raw.block) };
    }

    /// Observe the value owned by `shared` instead of the current one.
    ///
    /// Does nothing if this handle already names the same accounting block.
    pub fn assign(&mut self, shared: &SharedHandle<T, C>) {
        if block_of(self.raw.as_ref()) == block_of(shared.raw.as_ref()) {
            return;
        }
        *self = SharedHandle::downgrade(shared);
    }

    /// Exchange what the two handles observe. No counts change.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.raw, &mut other.raw);
    }

    /// Returns `true` if both handles share one accounting block.
    ///
    /// Two empty handles are considered equal.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        block_of(this.raw.as_ref()) == block_of(other.raw.as_ref())
    }
}

impl<T: ?Sized, C: Count> Clone for WeakHandle<T, C> {
    fn clone(&self) -> Self {
        if let Some(raw) = self.raw {
            raw.counts().retain_weak();
        }
        Self { raw: self.raw }
    }

    fn clone_from(&mut self, source: &Self) {
        if Self::ptr_eq(self, source) {
            return;
        }
        *self = source.clone();
    }
}

impl<T: ?Sized, C: Count> Drop for WeakHandle<T, C> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized, C: Count> Default for WeakHandle<T, C> {
    /// Constructs an empty weak handle (cannot be upgraded).
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized, C: Count> From<&SharedHandle<T, C>> for WeakHandle<T, C> {
    fn from(shared: &SharedHandle<T, C>) -> Self {
        SharedHandle::downgrade(shared)
    }
}

impl<T: ?Sized, C: Count> fmt::Debug for WeakHandle<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(Weak)")
    }
}

// ============================================================================
// Expired - failed promotion
// ============================================================================

/// Error returned when promoting a weak handle whose value is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Expired;

impl fmt::Display for Expired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("weak handle has expired: the value was already destroyed")
    }
}

impl std::error::Error for Expired {}

// ============================================================================
// Send + Sync trait implementations
// ============================================================================

// Local handles are `!Send` and `!Sync` through their `NonNull` fields.
// Atomic handles may cross threads when the value may.
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: ?Sized + Send + Sync> Send for SharedHandle<T, Atomic> {}
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: ?Sized + Send + Sync> Sync for SharedHandle<T, Atomic> {}
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: ?Sized + Send + Sync> Send for WeakHandle<T, Atomic> {}
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: ?Sized + Send + Sync> Sync for WeakHandle<T, Atomic> {}
