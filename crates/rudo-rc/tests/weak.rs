//! Tests for `Weak` observation, promotion and reassignment.

use std::cell::Cell;
use std::rc::Rc;

use rudo_rc::{Expired, Shared, Weak};

struct DropCounter(Rc<Cell<usize>>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn test_default_weak_is_expired() {
    let w: Weak<i32> = Weak::new();
    assert!(w.expired());
    assert_eq!(w.use_count(), 0);
    assert_eq!(w.weak_count(), 0);
    assert!(w.upgrade().is_none());
    assert!(Shared::is_empty(&w.lock()));
}

#[test]
fn test_weak_from_shared_counts() {
    let s = Shared::new(1);
    let w = Weak::from(&s);
    assert_eq!(w.use_count(), 1);
    assert_eq!(w.weak_count(), 1);
    assert_eq!(Shared::weak_count(&s), 1);
    assert_eq!(Shared::use_count(&s), 1);

    let w2 = w.clone();
    assert_eq!(Shared::weak_count(&s), 2);
    drop(w2);
    assert_eq!(Shared::weak_count(&s), 1);
}

#[test]
fn test_weak_does_not_keep_value_alive() {
    let drops = Rc::new(Cell::new(0));
    let s = Shared::new(DropCounter(Rc::clone(&drops)));
    let w = Shared::downgrade(&s);

    drop(s);
    assert_eq!(drops.get(), 1);
    assert!(w.expired());
    assert_eq!(w.use_count(), 0);
    assert_eq!(w.weak_count(), 1);
}

#[test]
fn test_lock_increments_use_count() {
    let s = Shared::new(String::from("Hello"));
    let w = Shared::downgrade(&s);
    let before = w.use_count();

    let locked = w.lock();
    assert_eq!(Shared::use_count(&locked), before + 1);
    assert_eq!(Shared::use_count(&locked), Shared::use_count(&s));
    assert_eq!(*locked, "Hello");
    assert!(Shared::ptr_eq(&locked, &s));

    drop(locked);
    assert_eq!(Shared::use_count(&s), before);
}

#[test]
fn test_lock_on_expired_returns_empty() {
    let s = Shared::new(5);
    let w = Shared::downgrade(&s);
    drop(s);

    let locked = w.lock();
    assert!(Shared::is_empty(&locked));
    assert_eq!(Shared::use_count(&locked), 0);
    assert!(w.upgrade().is_none());
}

#[test]
fn test_try_from_expired() {
    let s = Shared::new(5);
    let w = Shared::downgrade(&s);
    assert_eq!(*Shared::<i32>::try_from(&w).unwrap(), 5);

    drop(s);
    let err = Shared::<i32>::try_from(&w).unwrap_err();
    assert_eq!(err, Expired);
    assert!(err.to_string().contains("expired"));
}

#[test]
fn test_reset_is_idempotent() {
    let s = Shared::new(3);
    let mut w = Shared::downgrade(&s);
    let w2 = w.clone();

    w.reset();
    assert!(w.expired());
    assert_eq!(Shared::weak_count(&s), 1);

    w.reset();
    assert_eq!(Shared::weak_count(&s), 1);
    assert!(!w2.expired());
}

#[test]
fn test_move_empties_source() {
    let s = Shared::new(3);
    let mut w = Shared::downgrade(&s);

    let moved = std::mem::take(&mut w);
    assert!(w.expired());
    assert!(!moved.expired());
    assert_eq!(Shared::weak_count(&s), 1);
}

#[test]
fn test_swap_keeps_counts() {
    let a = Shared::new('a');
    let b = Shared::new('b');
    let mut wa = Shared::downgrade(&a);
    let mut wb = Shared::downgrade(&b);

    wa.swap(&mut wb);
    assert_eq!(*wa.lock(), 'b');
    assert_eq!(*wb.lock(), 'a');
    assert_eq!(Shared::weak_count(&a), 1);
    assert_eq!(Shared::weak_count(&b), 1);

    let mut empty = Weak::new();
    wa.swap(&mut empty);
    assert!(wa.expired());
    assert_eq!(*empty.lock(), 'b');
}

#[test]
fn test_assign_from_shared() {
    let a = Shared::new(1);
    let b = Shared::new(2);
    let mut w = Shared::downgrade(&a);

    w.assign(&b);
    assert_eq!(Shared::weak_count(&a), 0);
    assert_eq!(Shared::weak_count(&b), 1);
    assert_eq!(*w.lock(), 2);
}

#[test]
fn test_assign_same_block_is_noop() {
    let a = Shared::new(1);
    let mut w = Shared::downgrade(&a);
    let alias = Shared::clone(&a);

    w.assign(&alias);
    w.assign(&a);
    assert_eq!(Shared::weak_count(&a), 1);
}

#[test]
fn test_assign_to_empty_weak() {
    let a = Shared::new(1);
    let mut w = Weak::new();
    w.assign(&a);
    assert_eq!(w.use_count(), 1);
    assert_eq!(Shared::weak_count(&a), 1);

    w.assign(&Shared::empty());
    assert!(w.expired());
    assert_eq!(Shared::weak_count(&a), 0);
}

#[test]
fn test_clone_from_weak() {
    let a = Shared::new(1);
    let b = Shared::new(2);
    let wa = Shared::downgrade(&a);
    let mut wb = Shared::downgrade(&b);

    wb.clone_from(&wa);
    assert_eq!(Shared::weak_count(&a), 2);
    assert_eq!(Shared::weak_count(&b), 0);

    wb.clone_from(&wa);
    assert_eq!(Shared::weak_count(&a), 2);
}

#[test]
fn test_weak_outlives_value_and_block_is_reclaimed() {
    let before = rudo_rc::thread_metrics();
    let s = Shared::new(vec![0u8; 16]);
    let w = Shared::downgrade(&s);

    drop(s);
    let mid = rudo_rc::thread_metrics();
    assert_eq!(mid.values_destroyed, before.values_destroyed + 1);
    assert_eq!(mid.blocks_reclaimed, before.blocks_reclaimed);

    drop(w);
    let after = rudo_rc::thread_metrics();
    assert_eq!(after.blocks_reclaimed, before.blocks_reclaimed + 1);
}

#[test]
fn test_ptr_eq() {
    let a = Shared::new(1);
    let w1 = Shared::downgrade(&a);
    let w2 = w1.clone();
    let other = Shared::downgrade(&Shared::new(1));

    assert!(Weak::ptr_eq(&w1, &w2));
    assert!(!Weak::ptr_eq(&w1, &other));
    assert!(Weak::<i32>::ptr_eq(&Weak::new(), &Weak::new()));
}

#[test]
fn test_debug() {
    let w: Weak<i32> = Weak::new();
    assert_eq!(format!("{w:?}"), "(Weak)");
}
