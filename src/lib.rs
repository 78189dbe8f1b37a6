//! # dualgrad - MLP Gradients Four Ways
//!
//! Computes the weight gradient of a three-layer sigmoid perceptron by
//! analytic backpropagation, by forward-mode autodiff on sparse dual
//! numbers, and by forward and central finite differences, all in the same
//! flat weight layout so the results compare element by element.
//!
//! ## Architecture
//! - Flat weight layout: hidden block `[hidden][input + bias]`, then output
//!   block `[output][hidden + bias]`
//! - One generic evaluator over `f64` or [`DualNumber`]
//! - Typed per-thread arenas to keep evaluation off the heap
//! - Finite differences parallel over weight chunks (rayon)
//!
//! ## Usage
//! ```rust
//! use dualgrad::{GradientStrategy, LabeledImage, NetworkConfig, NeuralNetwork};
//!
//! let config = NetworkConfig::builder()
//!     .input_neurons(4)
//!     .hidden_neurons(3)
//!     .output_neurons(2)
//!     .init_seed(7)
//!     .build()
//!     .unwrap();
//! let mut network = NeuralNetwork::new(config).unwrap();
//! let sample = LabeledImage::new(1, vec![0.0, 0.25, 0.5, 1.0]);
//!
//! let backprop = GradientStrategy::Backprop.compute(&mut network, &sample).unwrap();
//! let dual = GradientStrategy::DualNumbers.compute(&mut network, &sample).unwrap();
//! assert_eq!(backprop.len(), network.num_weights());
//! for (b, d) in backprop.iter().zip(&dual) {
//!     assert!((b - d).abs() < 1e-3);
//! }
//! ```

pub mod arena;
pub mod calculus;
pub mod config;
pub mod dual;
pub mod error;
pub mod gradient;
pub mod network;
pub mod persist;
pub mod sample;
pub mod scalar;
pub mod train;

// Re-exports
pub use arena::{Arena, Span};
pub use config::{
    ConfigError, FiniteDifferenceConfig, NetworkConfig, NetworkConfigBuilder, TrainingConfig,
    DEFAULT_CHUNK_SIZE, DEFAULT_EPSILON, IMAGE_DIMS,
};
pub use dual::{DualNumber, ZERO_THRESHOLD};
pub use error::{GradError, GradResult};
pub use gradient::{
    central_difference_with, forward_difference_with, gradient_backprop,
    gradient_central_difference, gradient_dual_numbers, gradient_forward_difference,
    FiniteDifferenceReport, GradientFn, GradientStrategy, GradientVector,
};
pub use network::NeuralNetwork;
pub use persist::{
    read_weights_binary, weight_label, write_accuracy_csv, write_weights_binary,
    write_weights_csv,
};
pub use sample::LabeledImage;
pub use scalar::Scalar;
pub use train::{evaluate_accuracy, format_duration, Accuracy, Trainer, TrainingEvent, TrainingReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
