//! Training and Persistence Tests
//!
//! Trains small networks on a linearly separable synthetic set with every
//! strategy, then checks the persisted weight and report files.

use std::fs::File;
use std::io::{BufReader, BufWriter};

use dualgrad::{
    evaluate_accuracy, read_weights_binary, write_accuracy_csv, write_weights_binary,
    write_weights_csv, GradientStrategy, LabeledImage, NetworkConfig, NeuralNetwork, Trainer,
    TrainingConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

/// Two classes of 4-pixel images: bright on the left or bright on the right.
fn synthetic_set(count: usize, seed: u64) -> Vec<LabeledImage> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let label = i % 2;
            let base = if label == 0 {
                [0.9, 0.8, 0.1, 0.0]
            } else {
                [0.0, 0.1, 0.8, 0.9]
            };
            let pixels = base
                .iter()
                .map(|&p: &f64| (p + rng.gen_range(-0.1..0.1)).clamp(0.0, 1.0))
                .collect();
            LabeledImage::new(label, pixels)
        })
        .collect()
}

fn network(seed: u64) -> NeuralNetwork {
    let config = NetworkConfig::builder()
        .input_neurons(4)
        .hidden_neurons(6)
        .output_neurons(2)
        .init_seed(seed)
        .build()
        .unwrap();
    NeuralNetwork::new(config).unwrap()
}

fn trainer() -> Trainer {
    Trainer::new(TrainingConfig {
        epochs: 30,
        mini_batch_size: 5,
        learning_rate: 3.0,
        shuffle_seed: Some(7),
    })
}

#[test]
fn test_every_strategy_learns_separable_set() {
    let training = synthetic_set(40, 1);
    let testing = synthetic_set(20, 2);

    for strategy in GradientStrategy::ALL {
        let mut net = network(11);
        let report = trainer().train(&mut net, &training, &testing, strategy).unwrap();

        assert_eq!(report.strategy, strategy.name());
        assert_eq!(report.epoch_accuracy.len(), 30);
        let final_accuracy = report.final_accuracy();
        assert!(
            final_accuracy.percent() >= 90.0,
            "{strategy}: {final_accuracy}"
        );
        assert_eq!(evaluate_accuracy(&net, &testing).unwrap(), final_accuracy);
    }
}

#[test]
fn test_exact_strategies_train_alike() {
    let training = synthetic_set(20, 3);
    let config = TrainingConfig {
        epochs: 3,
        mini_batch_size: 4,
        learning_rate: 1.0,
        shuffle_seed: Some(5),
    };

    let mut by_backprop = network(4);
    let mut by_dual = network(4);
    Trainer::new(config)
        .train(&mut by_backprop, &training, &training, GradientStrategy::Backprop)
        .unwrap();
    Trainer::new(config)
        .train(&mut by_dual, &training, &training, GradientStrategy::DualNumbers)
        .unwrap();

    for (a, b) in by_backprop.weights().iter().zip(by_dual.weights()) {
        assert!((a - b).abs() < 1e-2);
    }
}

#[test]
fn test_binary_weights_file_round_trip() {
    let training = synthetic_set(10, 4);
    let mut net = network(9);
    Trainer::new(TrainingConfig {
        epochs: 1,
        shuffle_seed: Some(1),
        ..Default::default()
    })
    .train(&mut net, &training, &training, GradientStrategy::Backprop)
    .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("weights.bin");
    write_weights_binary(&net, BufWriter::new(File::create(&path).unwrap())).unwrap();
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        (net.num_weights() * 8) as u64
    );

    let loaded =
        read_weights_binary(net.config().clone(), BufReader::new(File::open(&path).unwrap()))
            .unwrap();

    assert_eq!(loaded.weights(), net.weights());
    let sample = &training[0];
    assert_eq!(
        loaded.evaluate_one_hot(&sample.pixels).unwrap(),
        net.evaluate_one_hot(&sample.pixels).unwrap()
    );
}

#[test]
fn test_report_csv_files() {
    let training = synthetic_set(10, 6);
    let mut net = network(2);
    let report = Trainer::new(TrainingConfig {
        epochs: 3,
        shuffle_seed: Some(2),
        ..Default::default()
    })
    .train(&mut net, &training, &training, GradientStrategy::CentralDifference)
    .unwrap();

    let mut accuracy_csv = Vec::new();
    write_accuracy_csv(&report.strategy, &report.epoch_accuracy, &mut accuracy_csv).unwrap();
    let accuracy_csv = String::from_utf8(accuracy_csv).unwrap();
    let lines: Vec<&str> = accuracy_csv.lines().collect();
    assert_eq!(lines[0], "\"Epoch\",\"CentralDiff\"");
    assert_eq!(lines.len(), 4);
    assert!(lines[3].starts_with("\"3\",\""));

    let mut weights_csv = Vec::new();
    write_weights_csv(&net, &mut weights_csv).unwrap();
    let weights_csv = String::from_utf8(weights_csv).unwrap();
    assert_eq!(weights_csv.lines().count(), net.num_weights());
    assert_eq!(
        weights_csv.lines().filter(|l| l.contains("Bias")).count(),
        6 + 2
    );
}

#[test]
fn test_update_with_wrong_length_is_ignored() {
    let mut net = network(3);
    let before = net.weights().to_vec();
    net.update_weights(&vec![1.0; net.num_weights() + 1], 3.0);
    assert_eq!(net.weights(), before.as_slice());
}

#[cfg(feature = "serde")]
#[test]
fn test_bincode_round_trip() {
    let net = network(12);
    let bytes = net.to_bytes().unwrap();
    let restored = NeuralNetwork::from_bytes(&bytes).unwrap();
    assert_eq!(restored, net);
}
