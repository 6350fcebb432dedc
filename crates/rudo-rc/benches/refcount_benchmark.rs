//! Benchmark: accounting cost of strong and weak handles
//!
//! Compares the single-threaded and atomic counter flavors on the hot paths:
//! allocation, clone/drop and weak promotion.

use criterion::{criterion_group, criterion_main, Criterion};
use rudo_rc::{make_shared, sync, Shared};
use std::hint::black_box;

struct Node {
    value: i64,
    next: Shared<Node>,
}

fn bench_make_shared(c: &mut Criterion) {
    c.bench_function("make_shared_local", |b| {
        b.iter(|| black_box(make_shared(black_box(42_u64))));
    });
    c.bench_function("make_shared_atomic", |b| {
        b.iter(|| black_box(sync::make_shared(black_box(42_u64))));
    });
}

fn bench_clone_drop(c: &mut Criterion) {
    let local = make_shared(7_u64);
    c.bench_function("clone_drop_local", |b| {
        b.iter(|| drop(black_box(Shared::clone(&local))));
    });

    let atomic = sync::make_shared(7_u64);
    c.bench_function("clone_drop_atomic", |b| {
        b.iter(|| drop(black_box(sync::Shared::clone(&atomic))));
    });
}

fn bench_weak_lock(c: &mut Criterion) {
    let local = make_shared(7_u64);
    let weak = Shared::downgrade(&local);
    c.bench_function("weak_lock_live_local", |b| {
        b.iter(|| black_box(weak.lock()));
    });

    let atomic = sync::make_shared(7_u64);
    let weak = sync::Shared::downgrade(&atomic);
    c.bench_function("weak_lock_live_atomic", |b| {
        b.iter(|| black_box(weak.lock()));
    });

    let expired = {
        let gone = make_shared(7_u64);
        Shared::downgrade(&gone)
    };
    c.bench_function("weak_lock_expired_local", |b| {
        b.iter(|| black_box(expired.lock()));
    });
}

fn bench_list_teardown(c: &mut Criterion) {
    c.bench_function("list_teardown_1000", |b| {
        b.iter(|| {
            let mut head = Shared::empty();
            for i in 0..1000 {
                head = Shared::new(Node {
                    value: i,
                    next: head,
                });
            }
            black_box((head.value, Shared::is_empty(&head.next)));
            drop(head);
        });
    });
}

criterion_group!(
    benches,
    bench_make_shared,
    bench_clone_drop,
    bench_weak_lock,
    bench_list_teardown
);
criterion_main!(benches);
