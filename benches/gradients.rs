//! Gradient strategy benchmarks.
//!
//! # Methodology
//!
//! **Comparison groups**:
//! - `strategy/<hidden>`: one full gradient with each of the four strategies
//! - `finite_difference_chunk`: central differences across chunk sizes
//! - `forward`: plain `f64` and dual-number cost evaluation
//!
//! Networks use 64 inputs so that the finite-difference strategies finish
//! in benchmark time; images are 80% background like MNIST digits.
//!
//! **Arena reuse**: strategies run on the calling thread's arena (and the
//! rayon workers' arenas), warmed by criterion's first iterations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dualgrad::{
    central_difference_with, DualNumber, FiniteDifferenceConfig, GradientStrategy, LabeledImage,
    NetworkConfig, NeuralNetwork,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

const INPUTS: usize = 64;
const OUTPUTS: usize = 10;

fn make_network(hidden: usize, seed: u64) -> NeuralNetwork {
    let config = NetworkConfig::builder()
        .input_neurons(INPUTS)
        .hidden_neurons(hidden)
        .output_neurons(OUTPUTS)
        .init_seed(seed)
        .build()
        .unwrap();
    NeuralNetwork::new(config).unwrap()
}

fn make_sample(seed: u64) -> LabeledImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let pixels = (0..INPUTS)
        .map(|_| if rng.gen_bool(0.8) { 0.0 } else { rng.gen_range(0.0..1.0) })
        .collect();
    LabeledImage::new(rng.gen_range(0..OUTPUTS), pixels)
}

/// Each strategy at a few hidden-layer widths.
fn bench_strategies(c: &mut Criterion) {
    let sample = make_sample(42);

    for hidden in [8_usize, 16, 32] {
        let mut network = make_network(hidden, 7);
        let mut group = c.benchmark_group(format!("strategy/{hidden}"));
        group.throughput(Throughput::Elements(network.num_weights() as u64));

        for strategy in GradientStrategy::ALL {
            group.bench_function(strategy.name(), |b| {
                b.iter(|| strategy.compute(&mut network, black_box(&sample)).unwrap());
            });
        }
        group.finish();
    }
}

/// Chunk size trades scheduling overhead against load balance.
fn bench_chunk_size(c: &mut Criterion) {
    let network = make_network(16, 7);
    let sample = make_sample(42);
    let mut group = c.benchmark_group("finite_difference_chunk");

    for chunk_size in [1_usize, 10, 100, 1000] {
        let config = FiniteDifferenceConfig {
            chunk_size,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(chunk_size), &config, |b, config| {
            b.iter(|| central_difference_with(&network, black_box(&sample), config).unwrap());
        });
    }

    group.finish();
}

/// Cost of carrying every partial derivative through the forward pass.
fn bench_forward(c: &mut Criterion) {
    let network = make_network(16, 7);
    let sample = make_sample(42);
    let mut group = c.benchmark_group("forward");

    group.bench_function("f64", |b| {
        b.iter(|| {
            network
                .evaluate_one_hot_cost::<f64>(black_box(&sample.pixels), sample.label)
                .unwrap()
        });
    });
    group.bench_function("dual", |b| {
        b.iter(|| {
            network
                .evaluate_one_hot_cost::<DualNumber>(black_box(&sample.pixels), sample.label)
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_strategies, bench_chunk_size, bench_forward);
criterion_main!(benches);
