//! Network, finite-difference and training configuration.
//!
//! This module provides [`NetworkConfig`] for the three-layer topology,
//! [`FiniteDifferenceConfig`] for the numerical strategies and
//! [`TrainingConfig`] for the mini-batch driver. Defaults reproduce the
//! classic MNIST setup (784 → 30 → 10, ε = 0.01, batch 10, lr 3.0).
//!
//! # Example
//!
//! ```rust
//! use dualgrad::NetworkConfig;
//!
//! // Default MNIST-sized network
//! let config = NetworkConfig::default();
//! assert_eq!(config.layer_dims(), [784, 30, 10]);
//!
//! // Or a tiny one for experiments
//! let config = NetworkConfig::builder()
//!     .input_neurons(2)
//!     .hidden_neurons(2)
//!     .output_neurons(2)
//!     .init_seed(7)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.num_weights(), 12);
//! ```
//!
//! # Weight Layout
//!
//! | Block | Length | Order |
//! |-------|--------|-------|
//! | hidden | `(inputs + 1) * hidden` | per hidden neuron: inputs, then bias |
//! | output | `(hidden + 1) * outputs` | per output neuron: hidden, then bias |
//!
//! The hidden block always comes first. Gradient vectors and persisted
//! weight files use exactly this order.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Side length of an MNIST digit image.
pub const IMAGE_DIMS: usize = 28;

/// Default finite-difference step.
pub const DEFAULT_EPSILON: f64 = 0.01;

/// Default number of weights per finite-difference work item.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Default number of training epochs.
pub const DEFAULT_EPOCHS: usize = 30;

/// Default mini-batch size.
pub const DEFAULT_MINI_BATCH_SIZE: usize = 10;

/// Default SGD learning rate.
pub const DEFAULT_LEARNING_RATE: f64 = 3.0;

/// Three-layer network shape.
///
/// # Creating a Configuration
///
/// ```rust
/// use dualgrad::NetworkConfig;
///
/// let config = NetworkConfig {
///     input_neurons: 4,
///     hidden_neurons: 3,
///     output_neurons: 2,
///     ..Default::default()
/// };
/// config.validate().expect("Invalid configuration");
/// assert_eq!(config.num_hidden_weights(), 15);
/// assert_eq!(config.num_output_weights(), 8);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkConfig {
    /// Input neurons, excluding the bias input.
    pub input_neurons: usize,

    /// Hidden neurons, excluding the bias activation.
    pub hidden_neurons: usize,

    /// Output neurons (one per class).
    pub output_neurons: usize,

    /// Optional seed for deterministic initialization (None => random).
    pub init_seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            input_neurons: IMAGE_DIMS * IMAGE_DIMS,
            hidden_neurons: 30,
            output_neurons: 10,
            init_seed: None,
        }
    }
}

impl NetworkConfig {
    /// Starts a builder initialized with the defaults.
    pub fn builder() -> NetworkConfigBuilder {
        NetworkConfigBuilder::new()
    }

    /// Weights feeding the hidden layer, biases included.
    #[inline]
    pub fn num_hidden_weights(&self) -> usize {
        (self.input_neurons + 1) * self.hidden_neurons
    }

    /// Weights feeding the output layer, biases included.
    #[inline]
    pub fn num_output_weights(&self) -> usize {
        (self.hidden_neurons + 1) * self.output_neurons
    }

    /// Total weight count; also the gradient vector length.
    #[inline]
    pub fn num_weights(&self) -> usize {
        self.num_hidden_weights() + self.num_output_weights()
    }

    /// Length of a sample's pixel array (inputs plus the bias 1.0).
    #[inline]
    pub fn input_len(&self) -> usize {
        self.input_neurons + 1
    }

    /// Returns `[input, hidden, output]`.
    pub fn layer_dims(&self) -> [usize; 3] {
        [self.input_neurons, self.hidden_neurons, self.output_neurons]
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDimension`] if any layer is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_neurons == 0 {
            return Err(ConfigError::InvalidDimension("input_neurons must be > 0"));
        }
        if self.hidden_neurons == 0 {
            return Err(ConfigError::InvalidDimension("hidden_neurons must be > 0"));
        }
        if self.output_neurons == 0 {
            return Err(ConfigError::InvalidDimension("output_neurons must be > 0"));
        }
        Ok(())
    }
}

/// Builder for [`NetworkConfig`].
#[derive(Debug, Clone, Default)]
pub struct NetworkConfigBuilder {
    config: NetworkConfig,
}

impl NetworkConfigBuilder {
    /// Creates a builder holding the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of input neurons.
    pub fn input_neurons(mut self, n: usize) -> Self {
        self.config.input_neurons = n;
        self
    }

    /// Sets the number of hidden neurons.
    pub fn hidden_neurons(mut self, n: usize) -> Self {
        self.config.hidden_neurons = n;
        self
    }

    /// Sets the number of output neurons.
    pub fn output_neurons(mut self, n: usize) -> Self {
        self.config.output_neurons = n;
        self
    }

    /// Fixes the weight initialization seed.
    pub fn init_seed(mut self, seed: u64) -> Self {
        self.config.init_seed = Some(seed);
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<NetworkConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Settings shared by the forward and central difference strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FiniteDifferenceConfig {
    /// Perturbation applied to one weight at a time.
    pub epsilon: f64,

    /// Contiguous weight indices handled per work item.
    pub chunk_size: usize,

    /// Dedicated worker count. None => rayon's global pool.
    pub num_threads: Option<usize>,
}

impl Default for FiniteDifferenceConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            chunk_size: DEFAULT_CHUNK_SIZE,
            num_threads: None,
        }
    }
}

impl FiniteDifferenceConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(ConfigError::InvalidEpsilon(self.epsilon));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidDimension("chunk_size must be > 0"));
        }
        if self.num_threads == Some(0) {
            return Err(ConfigError::InvalidDimension("num_threads must be > 0"));
        }
        Ok(())
    }
}

/// Mini-batch SGD settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrainingConfig {
    /// Passes over the training set.
    pub epochs: usize,

    /// Samples whose gradients are averaged per update.
    pub mini_batch_size: usize,

    /// Step size applied to the averaged gradient.
    pub learning_rate: f64,

    /// Optional seed for the per-epoch shuffle (None => random).
    pub shuffle_seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            mini_batch_size: DEFAULT_MINI_BATCH_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
            shuffle_seed: None,
        }
    }
}

impl TrainingConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epochs == 0 {
            return Err(ConfigError::InvalidDimension("epochs must be > 0"));
        }
        if self.mini_batch_size == 0 {
            return Err(ConfigError::InvalidDimension("mini_batch_size must be > 0"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::InvalidLearningRate(self.learning_rate));
        }
        Ok(())
    }
}

/// Errors returned by the `validate` methods.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A size parameter is zero.
    #[error("Invalid dimension: {0}")]
    InvalidDimension(&'static str),

    /// Finite-difference step is not a positive finite number.
    #[error("Epsilon must be positive and finite, got {0}")]
    InvalidEpsilon(f64),

    /// Learning rate is not a positive finite number.
    #[error("Learning rate must be positive and finite, got {0}")]
    InvalidLearningRate(f64),
}
