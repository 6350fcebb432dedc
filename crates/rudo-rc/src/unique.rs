//! The `Unique<T>` exclusive-ownership handle.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// A move-only owner of one heap value.
///
/// Unlike `Box<T>`, a `Unique` may be empty. Moving it out with
/// [`std::mem::take`] leaves an empty handle behind. It cannot be cloned.
///
/// # Panics
///
/// Dereferencing an empty handle panics. Use [`Unique::get`] for checked
/// access.
///
/// # Examples
///
/// ```
/// use rudo_rc::Unique;
///
/// let mut a = Unique::new(7);
/// let b = std::mem::take(&mut a);
/// assert!(Unique::is_empty(&a));
/// assert_eq!(*b, 7);
/// ```
pub struct Unique<T: ?Sized> {
    value: Option<Box<T>>,
}

impl<T> Unique<T> {
    /// Allocate `value` and own it.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized> Unique<T> {
    /// Create an empty handle.
    #[must_use]
    pub const fn empty() -> Self {
        Self { value: None }
    }

    /// Own an already boxed value.
    #[must_use]
    pub fn from_box(value: Box<T>) -> Self {
        Self { value: Some(value) }
    }

    /// Own a raw pointer. A null pointer gives an empty handle.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from [`Box::into_raw`] (or equivalent) and
    /// must not be owned by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        if ptr.is_null() {
            Self::empty()
        } else {
            // SAFETY: guaranteed by the caller.
            Self::from_box(unsafe { Box::from_raw(ptr) })
        }
    }

    /// Returns `true` if the handle owns nothing.
    #[must_use]
    pub const fn is_empty(this: &Self) -> bool {
        this.value.is_none()
    }

    /// Borrow the value, or `None` if the handle is empty.
    #[must_use]
    pub fn get(this: &Self) -> Option<&T> {
        this.value.as_deref()
    }

    /// Mutably borrow the value, or `None` if the handle is empty.
    #[must_use]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        this.value.as_deref_mut()
    }

    /// Destroy the owned value, if any, and leave the handle empty.
    pub fn reset(this: &mut Self) {
        this.value = None;
    }

    /// Destroy the owned value, if any, and own `value` instead.
    pub fn reset_with(this: &mut Self, value: Box<T>) {
        this.value = Some(value);
    }

    /// Give up ownership without destroying the value.
    ///
    /// The handle is left empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use rudo_rc::Unique;
    ///
    /// let mut u = Unique::new(String::from("kept"));
    /// let boxed = Unique::release(&mut u).unwrap();
    /// assert!(Unique::is_empty(&u));
    /// assert_eq!(*boxed, "kept");
    /// ```
    #[must_use = "dropping the released box destroys the value"]
    pub fn release(this: &mut Self) -> Option<Box<T>> {
        this.value.take()
    }
}

impl<T: ?Sized> Deref for Unique<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value
            .as_deref()
            .unwrap_or_else(|| panic!("attempted to dereference an empty Unique handle"))
    }
}

impl<T: ?Sized> DerefMut for Unique<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value
            .as_deref_mut()
            .unwrap_or_else(|| panic!("attempted to dereference an empty Unique handle"))
    }
}

impl<T: ?Sized> Default for Unique<T> {
    /// Constructs an empty handle.
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> From<Box<T>> for Unique<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Unique<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => f.debug_tuple("Unique").field(value).finish(),
            None => write!(f, "Unique(<empty>)"),
        }
    }
}
