//! Training on Synthetic Digits
//!
//! Generates one random sparse "digit" prototype per class, derives noisy
//! training and test samples from them, and trains the MLP with the chosen
//! gradient strategy. Writes the accuracy and weight files when `--out` is
//! given.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example train_synthetic -- --strategy dual --epochs 5
//! cargo run --release --example train_synthetic -- --strategy all --out out
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use clap::Parser;
use dualgrad::{
    format_duration, write_accuracy_csv, write_weights_binary, write_weights_csv,
    GradientStrategy, LabeledImage, NetworkConfig, NeuralNetwork, Trainer, TrainingConfig,
    TrainingEvent, TrainingReport,
};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Parser, Debug)]
#[command(name = "train_synthetic")]
#[command(about = "Train the MLP on synthetic digits with any gradient strategy")]
struct Args {
    /// Strategy: backprop, dual, forward, central, or all
    #[arg(long, default_value = "backprop")]
    strategy: String,

    /// Image side length (inputs = side * side)
    #[arg(long, default_value = "8")]
    side: usize,

    /// Hidden neurons
    #[arg(long, default_value = "30")]
    hidden: usize,

    /// Number of classes
    #[arg(long, default_value = "10")]
    classes: usize,

    /// Training samples per class
    #[arg(long, default_value = "60")]
    train_per_class: usize,

    /// Test samples per class
    #[arg(long, default_value = "20")]
    test_per_class: usize,

    /// Training epochs
    #[arg(long, default_value = "10")]
    epochs: usize,

    /// Mini-batch size
    #[arg(long, default_value = "10")]
    batch_size: usize,

    /// Learning rate
    #[arg(long, default_value = "3.0")]
    lr: f64,

    /// Seed for data, initialization and shuffling
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Directory for the CSV and binary outputs
    #[arg(long)]
    out: Option<String>,
}

/// Sparse prototypes: each class lights up about a quarter of the pixels.
fn prototypes(classes: usize, inputs: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    (0..classes)
        .map(|_| {
            (0..inputs)
                .map(|_| if rng.gen_bool(0.25) { rng.gen_range(0.5..1.0) } else { 0.0 })
                .collect()
        })
        .collect()
}

fn samples(protos: &[Vec<f64>], per_class: usize, rng: &mut StdRng) -> Vec<LabeledImage> {
    let mut out = Vec::with_capacity(protos.len() * per_class);
    for _ in 0..per_class {
        for (label, proto) in protos.iter().enumerate() {
            let pixels = proto
                .iter()
                .map(|&p| {
                    if p == 0.0 && !rng.gen_bool(0.05) {
                        0.0
                    } else {
                        (p + rng.gen_range(-0.3..0.3)).clamp(0.0, 1.0)
                    }
                })
                .collect();
            out.push(LabeledImage::new(label, pixels));
        }
    }
    out
}

fn save(report: &TrainingReport, network: &NeuralNetwork, dir: &Path) -> dualgrad::GradResult<()> {
    std::fs::create_dir_all(dir)?;
    let name = &report.strategy;
    write_accuracy_csv(
        name,
        &report.epoch_accuracy,
        BufWriter::new(File::create(dir.join(format!("{name}_Accuracy.csv")))?),
    )?;
    write_weights_csv(
        network,
        BufWriter::new(File::create(dir.join(format!("{name}_Weights.csv")))?),
    )?;
    write_weights_binary(
        network,
        BufWriter::new(File::create(dir.join(format!("{name}_Weights.bin")))?),
    )?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let strategies = if args.strategy == "all" {
        GradientStrategy::ALL.to_vec()
    } else {
        vec![args.strategy.parse::<GradientStrategy>()?]
    };

    let inputs = args.side * args.side;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let protos = prototypes(args.classes, inputs, &mut rng);
    let training = samples(&protos, args.train_per_class, &mut rng);
    let testing = samples(&protos, args.test_per_class, &mut rng);

    let config = NetworkConfig::builder()
        .input_neurons(inputs)
        .hidden_neurons(args.hidden)
        .output_neurons(args.classes)
        .init_seed(args.seed)
        .build()?;

    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║            MLP Training on Synthetic Digits               ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();
    println!("Configuration:");
    println!("  Layers:         {} -> {} -> {}", inputs, args.hidden, args.classes);
    println!("  Weights:        {}", config.num_weights());
    println!("  Samples:        {} train / {} test", training.len(), testing.len());
    println!("  Epochs:         {}", args.epochs);
    println!("  Batch size:     {}", args.batch_size);
    println!("  Learning rate:  {}", args.lr);
    println!();

    let trainer = Trainer::new(TrainingConfig {
        epochs: args.epochs,
        mini_batch_size: args.batch_size,
        learning_rate: args.lr,
        shuffle_seed: Some(args.seed),
    });

    for strategy in strategies {
        println!("Training with {}...", strategy);
        let mut network = NeuralNetwork::new(config.clone())?;

        let pb = ProgressBar::new(training.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Epoch {msg} [{bar:30.cyan/blue}] {pos}/{len}")
                .unwrap()
                .progress_chars("█▓░"),
        );

        let report = trainer.train_with(
            &mut network,
            &training,
            &testing,
            strategy.name(),
            strategy.gradient_fn(),
            |event| match event {
                TrainingEvent::Batch {
                    epoch, processed, ..
                } => {
                    pb.set_message(format!("{}/{}", epoch + 1, args.epochs));
                    pb.set_position(processed as u64);
                }
                TrainingEvent::Epoch {
                    epoch,
                    accuracy,
                    duration,
                } => {
                    pb.println(format!(
                        "[Epoch {:2}/{}] Duration: {} Accuracy: {}",
                        epoch + 1,
                        args.epochs,
                        format_duration(duration),
                        accuracy
                    ));
                    pb.reset();
                }
            },
        )?;
        pb.finish_and_clear();

        println!(
            "[Total] Duration {} Accuracy: {}",
            format_duration(report.duration),
            report.final_accuracy()
        );

        if let Some(dir) = &args.out {
            save(&report, &network, Path::new(dir))?;
            println!("  Saved {}_* files to {}", report.strategy, dir);
        }
        println!();
    }

    Ok(())
}
