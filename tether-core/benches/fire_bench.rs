//! Benchmarks of the notification path: invalidation fan-out, bound chains,
//! bidirectional pairs and content mirrors.
//!
//! Run with: cargo bench -p tether-core

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use tether_core::{
    bind_content, ChangeListener, InvalidationListener, Observable, ObservableList,
    ObservableValue, Property,
};

// ---------------------------------------------------------------------------
// 1. One property, many listeners
// ---------------------------------------------------------------------------

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fire/fan_out");

    for count in [1u64, 8, 64, 512] {
        group.throughput(Throughput::Elements(count));

        let property = Property::new(0u64);
        for _ in 0..count {
            property.add_listener(InvalidationListener::new(|observable| {
                black_box(observable.observable_id());
                Ok(())
            }));
        }

        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("invalidation", count), &(), |b, _| {
            b.iter(|| {
                next += 1;
                property.set(black_box(next)).unwrap();
                black_box(property.get());
            });
        });
    }

    group.finish();
}

fn bench_change_listeners(c: &mut Criterion) {
    let mut group = c.benchmark_group("fire/change");

    for count in [1u64, 16, 128] {
        group.throughput(Throughput::Elements(count));

        let property = Property::new(0u64);
        for _ in 0..count {
            property.add_change_listener(ChangeListener::new(|_, old: &u64, new: &u64| {
                black_box(old + new);
                Ok(())
            }));
        }

        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("change", count), &(), |b, _| {
            b.iter(|| {
                next += 1;
                property.set(black_box(next)).unwrap();
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. Chains of bound properties
// ---------------------------------------------------------------------------

fn bench_bound_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("fire/bound_chain");

    for depth in [1usize, 10, 100] {
        let root = Property::new(0u64);
        let mut chain = vec![root.clone()];
        for _ in 0..depth {
            let next = Property::new(0u64);
            if let Some(previous) = chain.last() {
                next.bind(previous).unwrap();
            }
            chain.push(next);
        }
        let tail = chain[depth].clone();

        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("set_then_read", depth), &(), |b, _| {
            b.iter(|| {
                next += 1;
                root.set(next).unwrap();
                black_box(tail.get());
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 3. Bidirectional pairs
// ---------------------------------------------------------------------------

fn bench_bidirectional(c: &mut Criterion) {
    let a = Property::new(0u64);
    let b = Property::new(0u64);
    a.bind_bidirectional(&b).unwrap();

    let mut next = 0u64;
    c.bench_function("fire/bidirectional/alternate", |bench| {
        bench.iter(|| {
            next += 1;
            if next % 2 == 0 {
                a.set(next).unwrap();
            } else {
                b.set(next).unwrap();
            }
            black_box(a.get());
        });
    });
}

// ---------------------------------------------------------------------------
// 4. Content mirrors
// ---------------------------------------------------------------------------

fn bench_content_mirror(c: &mut Criterion) {
    let mut group = c.benchmark_group("fire/content");

    for len in [16usize, 1_024] {
        let source = ObservableList::from_vec((0..len as u64).collect());
        let target = ObservableList::new();
        bind_content(&target, &source).unwrap();

        group.bench_with_input(BenchmarkId::new("set_element", len), &len, |b, &len| {
            let mut index = 0usize;
            b.iter(|| {
                index = (index + 7) % len;
                source.set(index, black_box(index as u64)).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fan_out,
    bench_change_listeners,
    bench_bound_chain,
    bench_bidirectional,
    bench_content_mirror,
);
criterion_main!(benches);
