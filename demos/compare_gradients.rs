//! Gradient Strategy Comparison
//!
//! Computes the gradient of one sample with all four strategies, reports
//! their wall-clock time and how far each lands from backprop.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example compare_gradients
//! cargo run --release --example compare_gradients -- --inputs 64 --hidden 16 --epsilon 0.001
//! ```

use std::time::Instant;

use clap::Parser;
use dualgrad::{
    central_difference_with, forward_difference_with, weight_label, FiniteDifferenceConfig,
    GradientStrategy, LabeledImage, NetworkConfig, NeuralNetwork,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Parser, Debug)]
#[command(name = "compare_gradients")]
#[command(about = "Compare backprop, dual numbers and finite differences on one sample")]
struct Args {
    /// Input neurons (784 = 28x28 image)
    #[arg(long, default_value = "784")]
    inputs: usize,

    /// Hidden neurons
    #[arg(long, default_value = "30")]
    hidden: usize,

    /// Output neurons
    #[arg(long, default_value = "10")]
    outputs: usize,

    /// Fraction of input pixels that are exactly zero
    #[arg(long, default_value = "0.8")]
    sparsity: f64,

    /// Finite-difference step
    #[arg(long, default_value = "0.01")]
    epsilon: f64,

    /// Weights per finite-difference work item
    #[arg(long, default_value = "100")]
    chunk_size: usize,

    /// Seed for the network and the sample
    #[arg(long, default_value = "1")]
    seed: u64,
}

fn max_abs_difference(reference: &[f64], other: &[f64]) -> (usize, f64) {
    reference
        .iter()
        .zip(other)
        .map(|(a, b)| (a - b).abs())
        .enumerate()
        .fold((0, 0.0), |best, (i, d)| if d > best.1 { (i, d) } else { best })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = NetworkConfig::builder()
        .input_neurons(args.inputs)
        .hidden_neurons(args.hidden)
        .output_neurons(args.outputs)
        .init_seed(args.seed)
        .build()?;
    let mut network = NeuralNetwork::new(config.clone())?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let pixels = (0..args.inputs)
        .map(|_| if rng.gen_bool(args.sparsity) { 0.0 } else { rng.gen_range(0.0..1.0) })
        .collect();
    let sample = LabeledImage::new(rng.gen_range(0..args.outputs), pixels);

    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║              Gradient Strategy Comparison                 ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();
    println!(
        "MLP layers are: {}, {}, {}, for a total of {} weights.",
        args.inputs,
        args.hidden,
        args.outputs,
        config.num_weights()
    );
    println!("Sample label: {}", sample.label);
    println!();

    let fd_config = FiniteDifferenceConfig {
        epsilon: args.epsilon,
        chunk_size: args.chunk_size,
        num_threads: None,
    };
    fd_config.validate()?;

    let start = Instant::now();
    let reference = GradientStrategy::Backprop.compute(&mut network, &sample)?;
    let backprop_time = start.elapsed();

    println!("{:<14} {:>12} {:>14} {:>14}", "Strategy", "Time", "Evaluations", "Max |Δ|");
    println!("─────────────────────────────────────────────────────────────");
    println!("{:<14} {:>12.3?} {:>14} {:>14}", "Backprop", backprop_time, 1, "-");

    for strategy in &GradientStrategy::ALL[1..] {
        let start = Instant::now();
        let (gradient, evaluations) = match strategy {
            GradientStrategy::ForwardDifference => {
                let report = forward_difference_with(&network, &sample, &fd_config)?;
                (report.gradient, report.perturbed_evaluations + 1)
            }
            GradientStrategy::CentralDifference => {
                let report = central_difference_with(&network, &sample, &fd_config)?;
                (report.gradient, report.perturbed_evaluations)
            }
            _ => (strategy.compute(&mut network, &sample)?, 1),
        };
        let elapsed = start.elapsed();

        let (worst, diff) = max_abs_difference(&reference, &gradient);
        println!(
            "{:<14} {:>12.3?} {:>14} {:>14.3e}   worst: {}",
            strategy.name(),
            elapsed,
            evaluations,
            diff,
            weight_label(&config, worst)
        );
    }

    Ok(())
}
