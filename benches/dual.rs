//! Dual number micro-benchmarks.
//!
//! Range width drives the cost of every operation, so each group sweeps the
//! number of stored partials.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dualgrad::DualNumber;

fn dense(width: usize, offset: usize) -> DualNumber {
    let derivatives = (0..width).map(|i| 1.0 + i as f64 * 0.01).collect();
    DualNumber::from_parts(0.5, offset, derivatives)
}

fn bench_binary_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("dual_mul");

    for width in [16_usize, 256, 4096] {
        let a = dense(width, 0);
        let b = dense(width, width / 2);
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |bench, _| {
            bench.iter(|| black_box(&a) * black_box(&b));
        });
    }

    group.finish();
}

/// The accumulation pattern of a neuron: many fused multiply-adds into one
/// growing accumulator.
fn bench_mul_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("dual_mul_add");

    for inputs in [32_usize, 256, 785] {
        let weights: Vec<DualNumber> = (0..inputs)
            .map(|i| DualNumber::variable(0.1, i))
            .collect();
        let pixels: Vec<f64> = (0..inputs).map(|i| (i % 7) as f64 / 7.0).collect();
        let mut acc = DualNumber::constant(0.0);

        group.throughput(Throughput::Elements(inputs as u64));
        group.bench_with_input(BenchmarkId::from_parameter(inputs), &inputs, |bench, _| {
            bench.iter(|| {
                acc.assign_constant(0.0);
                for (w, &x) in weights.iter().zip(&pixels) {
                    acc.mul_add_real(w, black_box(x));
                }
                acc.real()
            });
        });
    }

    group.finish();
}

fn bench_sigmoid(c: &mut Criterion) {
    let d = dense(785, 0);
    c.bench_function("dual_sigmoid_785", |b| b.iter(|| black_box(&d).sigmoid()));
}

criterion_group!(benches, bench_binary_ops, bench_mul_add, bench_sigmoid);
criterion_main!(benches);
