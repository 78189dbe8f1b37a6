//! The four gradient strategies.
//!
//! Every strategy maps `(network, sample)` to the gradient of the one-hot
//! MSE cost with respect to every weight, in the flat weight layout:
//!
//! | Strategy | Cost evaluations | Exact? |
//! |----------|------------------|--------|
//! | [`gradient_backprop`] | 1 forward + 1 backward | yes |
//! | [`gradient_dual_numbers`] | 1 forward on dual numbers | up to edge trimming |
//! | [`gradient_forward_difference`] | 1 + one per weight | O(ε) |
//! | [`gradient_central_difference`] | two per weight | O(ε²) |
//!
//! The finite-difference strategies split the weight indices into
//! contiguous chunks processed on a rayon pool. The network is cloned once
//! per pool thread; a chunk perturbs a single weight of its thread's clone,
//! evaluates, and writes the saved value back before moving on.
//!
//! # Example
//!
//! ```rust
//! use dualgrad::{GradientStrategy, LabeledImage, NetworkConfig, NeuralNetwork};
//!
//! let config = NetworkConfig::builder()
//!     .input_neurons(3)
//!     .hidden_neurons(4)
//!     .output_neurons(2)
//!     .init_seed(1)
//!     .build()
//!     .unwrap();
//! let mut network = NeuralNetwork::new(config).unwrap();
//! let sample = LabeledImage::new(1, vec![0.2, 0.0, 0.9]);
//!
//! let exact = GradientStrategy::Backprop.compute(&mut network, &sample).unwrap();
//! let central = GradientStrategy::CentralDifference.compute(&mut network, &sample).unwrap();
//! for (a, b) in exact.iter().zip(&central) {
//!     assert!((a - b).abs() < 1e-3);
//! }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;

use crate::config::FiniteDifferenceConfig;
use crate::error::{GradError, GradResult};
use crate::network::NeuralNetwork;
use crate::sample::LabeledImage;

/// One partial derivative per weight, in weight layout order.
pub type GradientVector = Vec<f64>;

/// Signature shared by all strategies.
///
/// The network is taken mutably so a strategy may use it as scratch space;
/// every built-in strategy leaves the weights bit-for-bit unchanged.
pub type GradientFn = fn(&mut NeuralNetwork, &LabeledImage) -> GradResult<GradientVector>;

/// Gradient by analytic backpropagation.
pub fn gradient_backprop(
    network: &mut NeuralNetwork,
    sample: &LabeledImage,
) -> GradResult<GradientVector> {
    sample.validate(network.config())?;
    network.forward_pass_and_backprop(&sample.pixels, sample.label)
}

/// Gradient read off a single forward pass on dual numbers.
///
/// Weight `i` is seeded as free variable `i`, so derivative `i` of the
/// cost is `∂cost/∂w[i]`.
pub fn gradient_dual_numbers(
    network: &mut NeuralNetwork,
    sample: &LabeledImage,
) -> GradResult<GradientVector> {
    sample.validate(network.config())?;
    network.dual_gradient(&sample.pixels, sample.label)
}

/// Forward differences with the default [`FiniteDifferenceConfig`].
pub fn gradient_forward_difference(
    network: &mut NeuralNetwork,
    sample: &LabeledImage,
) -> GradResult<GradientVector> {
    forward_difference_with(network, sample, &FiniteDifferenceConfig::default())
        .map(|report| report.gradient)
}

/// Central differences with the default [`FiniteDifferenceConfig`].
pub fn gradient_central_difference(
    network: &mut NeuralNetwork,
    sample: &LabeledImage,
) -> GradResult<GradientVector> {
    central_difference_with(network, sample, &FiniteDifferenceConfig::default())
        .map(|report| report.gradient)
}

/// Result of a finite-difference run.
#[derive(Debug, Clone, PartialEq)]
pub struct FiniteDifferenceReport {
    /// The estimated gradient.
    pub gradient: GradientVector,

    /// Cost evaluations on a perturbed network. The unperturbed baseline of
    /// forward differences is not counted.
    pub perturbed_evaluations: usize,
}

/// `(C(w + ε) - C(w)) / ε` per weight, sharing one baseline `C(w)`.
pub fn forward_difference_with(
    network: &NeuralNetwork,
    sample: &LabeledImage,
    config: &FiniteDifferenceConfig,
) -> GradResult<FiniteDifferenceReport> {
    config.validate()?;
    sample.validate(network.config())?;
    let baseline = network.evaluate_one_hot_cost::<f64>(&sample.pixels, sample.label)?;
    run(network, sample, config, Scheme::Forward { baseline })
}

/// `(C(w + ε) - C(w - ε)) / 2ε` per weight.
pub fn central_difference_with(
    network: &NeuralNetwork,
    sample: &LabeledImage,
    config: &FiniteDifferenceConfig,
) -> GradResult<FiniteDifferenceReport> {
    config.validate()?;
    sample.validate(network.config())?;
    run(network, sample, config, Scheme::Central)
}

#[derive(Debug, Clone, Copy)]
enum Scheme {
    Forward { baseline: f64 },
    Central,
}

impl Scheme {
    fn evaluations(&self) -> usize {
        match self {
            Scheme::Forward { .. } => 1,
            Scheme::Central => 2,
        }
    }
}

fn run(
    network: &NeuralNetwork,
    sample: &LabeledImage,
    config: &FiniteDifferenceConfig,
    scheme: Scheme,
) -> GradResult<FiniteDifferenceReport> {
    let job = || estimate(network, sample, config, scheme);
    match config.num_threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| GradError::thread_pool(e.to_string()))?
            .install(job),
        None => job(),
    }
}

fn estimate(
    network: &NeuralNetwork,
    sample: &LabeledImage,
    config: &FiniteDifferenceConfig,
    scheme: Scheme,
) -> GradResult<FiniteDifferenceReport> {
    let chunk_size = config.chunk_size;
    let epsilon = config.epsilon;
    let mut gradient = vec![0.0; network.num_weights()];

    let chunks = (gradient.len() + chunk_size - 1) / chunk_size;
    let copies = worker_copies(network, chunks);

    let perturbed_evaluations = gradient
        .par_chunks_mut(chunk_size)
        .enumerate()
        .map(|(chunk, out)| -> GradResult<usize> {
            let slot = rayon::current_thread_index().unwrap_or(0) % copies.len();
            let mut local = copies[slot].lock().unwrap_or_else(PoisonError::into_inner);
            let start = chunk * chunk_size;
            let mut evaluations = 0;
            for (offset, g) in out.iter_mut().enumerate() {
                let index = start + offset;
                if feeds_from_zero_input(&local, sample, index) {
                    *g = 0.0;
                    continue;
                }
                *g = match scheme {
                    Scheme::Forward { baseline } => {
                        (perturbed_cost(&mut local, sample, index, epsilon)? - baseline) / epsilon
                    }
                    Scheme::Central => {
                        let below = perturbed_cost(&mut local, sample, index, -epsilon)?;
                        let above = perturbed_cost(&mut local, sample, index, epsilon)?;
                        (above - below) / (2.0 * epsilon)
                    }
                };
                evaluations += scheme.evaluations();
            }
            Ok(evaluations)
        })
        .try_reduce(|| 0, |a, b| Ok(a + b))?;

    Ok(FiniteDifferenceReport {
        gradient,
        perturbed_evaluations,
    })
}

/// One network copy per pool thread, or per chunk when there are fewer
/// chunks than threads. A chunk locks the copy of the thread it runs on.
fn worker_copies(network: &NeuralNetwork, chunks: usize) -> Vec<Mutex<NeuralNetwork>> {
    let count = rayon::current_num_threads().min(chunks).max(1);
    (0..count).map(|_| Mutex::new(network.clone())).collect()
}

/// True for a hidden-layer weight whose input activation is exactly zero;
/// its partial derivative is zero. Bias weights never qualify.
fn feeds_from_zero_input(network: &NeuralNetwork, sample: &LabeledImage, index: usize) -> bool {
    if index >= network.num_hidden_weights() {
        return false;
    }
    let row_len = network.config().input_len();
    let input = index % row_len;
    input < row_len - 1 && sample.pixels[input] == 0.0
}

fn perturbed_cost(
    network: &mut NeuralNetwork,
    sample: &LabeledImage,
    index: usize,
    delta: f64,
) -> GradResult<f64> {
    let saved = network.weight(index);
    network.set_weight(index, saved + delta);
    let cost = network.evaluate_one_hot_cost::<f64>(&sample.pixels, sample.label);
    network.set_weight(index, saved);
    cost
}

/// Named gradient strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GradientStrategy {
    /// Analytic backpropagation.
    Backprop,
    /// Forward-mode autodiff on sparse dual numbers.
    DualNumbers,
    /// Forward finite differences.
    ForwardDifference,
    /// Central finite differences.
    CentralDifference,
}

impl GradientStrategy {
    /// Every strategy, fastest first.
    pub const ALL: [GradientStrategy; 4] = [
        GradientStrategy::Backprop,
        GradientStrategy::DualNumbers,
        GradientStrategy::ForwardDifference,
        GradientStrategy::CentralDifference,
    ];

    /// Short name used in reports and file names.
    pub fn name(&self) -> &'static str {
        match self {
            GradientStrategy::Backprop => "Backprop",
            GradientStrategy::DualNumbers => "DualNumbers",
            GradientStrategy::ForwardDifference => "ForwardDiff",
            GradientStrategy::CentralDifference => "CentralDiff",
        }
    }

    /// The strategy as a plain function.
    pub fn gradient_fn(&self) -> GradientFn {
        match self {
            GradientStrategy::Backprop => gradient_backprop,
            GradientStrategy::DualNumbers => gradient_dual_numbers,
            GradientStrategy::ForwardDifference => gradient_forward_difference,
            GradientStrategy::CentralDifference => gradient_central_difference,
        }
    }

    /// Runs the strategy.
    pub fn compute(
        &self,
        network: &mut NeuralNetwork,
        sample: &LabeledImage,
    ) -> GradResult<GradientVector> {
        (self.gradient_fn())(network, sample)
    }

    /// Whether the strategy is a finite-difference estimate.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            GradientStrategy::ForwardDifference | GradientStrategy::CentralDifference
        )
    }
}

impl fmt::Display for GradientStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GradientStrategy {
    type Err = GradError;

    /// Accepts the [`name`](GradientStrategy::name) or a short alias,
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "backprop" | "backpropagation" => Ok(GradientStrategy::Backprop),
            "dualnumbers" | "dual" | "dual-numbers" => Ok(GradientStrategy::DualNumbers),
            "forwarddiff" | "forward" | "forward-difference" => {
                Ok(GradientStrategy::ForwardDifference)
            }
            "centraldiff" | "central" | "central-difference" => {
                Ok(GradientStrategy::CentralDifference)
            }
            _ => Err(GradError::unknown_strategy(s)),
        }
    }
}
