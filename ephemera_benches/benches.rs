//! Collection and dispatch cost with many weak handles and registrations.
//!
//! Run with: cargo bench -p ephemera_benches

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use ephemera::{Context, ContextBuilder, FinalizationRegistry, NativeFunction, Value, WeakRef};

const SIZES: [usize; 3] = [100, 1_000, 10_000];

/// Half of the targets stay rooted, the other half die at the next collection.
fn context_with_weak_refs(count: usize) -> Context {
    let mut cx = ContextBuilder::new().build();

    for i in 0..count {
        let target = cx.alloc_object(vec![]).unwrap();
        let target_root = cx.root(target);

        let weak_ref = WeakRef::create(&mut cx, Value::from(target)).unwrap();
        cx.root(weak_ref);

        if i % 2 == 1 {
            cx.unroot(target_root);
        }
    }

    cx.advance_turn();
    cx
}

fn context_with_registrations(count: usize) -> Context {
    let mut cx = ContextBuilder::new().build();

    let callback = NativeFunction::new(|_, held_value| {
        black_box(held_value);
        Ok(())
    });
    let registry = FinalizationRegistry::create(&mut cx, Value::from(callback)).unwrap();
    cx.root(registry);

    for i in 0..count {
        let target = cx.alloc_object(vec![]).unwrap();
        if i % 2 == 0 {
            cx.root(target);
        }

        FinalizationRegistry::register(
            &mut cx,
            registry,
            Value::from(target),
            Value::from(i as f64),
            Some(Value::from(target)),
        )
        .unwrap();
    }

    cx.advance_turn();
    cx
}

fn bench_collect_weak_refs(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_weak_refs");

    for count in SIZES {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || context_with_weak_refs(count),
                |mut cx| {
                    cx.collect_garbage();
                    cx
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_collect_registrations(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_registrations");

    for count in SIZES {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || context_with_registrations(count),
                |mut cx| {
                    cx.collect_garbage();
                    cx
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_cleanup");

    for count in SIZES {
        group.throughput(Throughput::Elements(count as u64 / 2));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let mut cx = context_with_registrations(count);
                    cx.collect_garbage();
                    cx
                },
                |mut cx| {
                    black_box(cx.run_jobs());
                    cx
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_deref(c: &mut Criterion) {
    let mut cx = ContextBuilder::new().build();
    let target = cx.alloc_object(vec![]).unwrap();
    cx.root(target);
    let weak_ref = WeakRef::create(&mut cx, Value::from(target)).unwrap();
    cx.root(weak_ref);

    c.bench_function("weak_ref_deref", |b| {
        b.iter(|| black_box(WeakRef::deref(&mut cx, weak_ref)));
    });
}

criterion_group!(
    benches,
    bench_collect_weak_refs,
    bench_collect_registrations,
    bench_dispatch,
    bench_deref
);
criterion_main!(benches);
