//! Three-layer sigmoid network with a generic evaluator.
//!
//! The same forward pass runs on `f64` or on [`DualNumber`]; the analytic
//! backward pass runs on `f64`. Every evaluation takes its intermediate
//! storage from an [`Arena`], either the calling thread's (`evaluate`,
//! `evaluate_one_hot_cost`, ...) or one passed explicitly (`*_in`).
//!
//! # Arena Sizing
//!
//! | Evaluation | Elements |
//! |------------|----------|
//! | forward, `T` | `num_weights + (H + 1) + (O + 1)` |
//! | backprop, `f64` | `(H + 1) + (O + 1) + O + H` |
//!
//! The weight block of the forward pass is only used when `T` needs its own
//! copy of the weights (dual numbers).

use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::arena::{Arena, Span};
use crate::config::NetworkConfig;
use crate::dual::DualNumber;
use crate::error::{GradError, GradResult};
use crate::scalar::Scalar;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Layer operands: either the raw `f64` values or values of the evaluation
/// type.
enum Operands<'a, T> {
    Real(&'a [f64]),
    Scalar(&'a [T]),
}

impl<T> Clone for Operands<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Operands<'_, T> {}

impl<T> Operands<'_, T> {
    fn len(&self) -> usize {
        match self {
            Operands::Real(v) => v.len(),
            Operands::Scalar(v) => v.len(),
        }
    }
}

/// Hidden and output activations of one forward pass, bias entries
/// included.
#[derive(Debug, Clone, Copy)]
struct Activations {
    hidden: Span,
    output: Span,
}

/// Writes `sigmoid(w_n · a)` for every neuron `n`, followed by a constant
/// `1.0` for the next layer's bias.
///
/// `out` has one more element than there are neurons; `weights` holds
/// `activations.len()` values per neuron.
fn evaluate_layer<T: Scalar>(activations: Operands<'_, T>, weights: Operands<'_, T>, out: &mut [T]) {
    let inputs = activations.len();
    let Some((bias, neurons)) = out.split_last_mut() else {
        return;
    };
    debug_assert_eq!(weights.len(), neurons.len() * inputs);

    for (n, z) in neurons.iter_mut().enumerate() {
        let row = n * inputs..(n + 1) * inputs;
        z.assign_constant(0.0);

        match (activations, weights) {
            (Operands::Real(a), Operands::Real(w)) => {
                let dot: f64 = a.iter().zip(&w[row]).map(|(x, w)| x * w).sum();
                z.assign_constant(dot);
            }
            (Operands::Real(a), Operands::Scalar(w)) => {
                for (&x, w) in a.iter().zip(&w[row]) {
                    z.mul_add_real(w, x);
                }
            }
            (Operands::Scalar(a), Operands::Real(w)) => {
                for (x, &w) in a.iter().zip(&w[row]) {
                    z.mul_add_real(x, w);
                }
            }
            (Operands::Scalar(a), Operands::Scalar(w)) => {
                for (x, w) in a.iter().zip(&w[row]) {
                    z.mul_add(w, x);
                }
            }
        }

        z.sigmoid_assign();
    }

    bias.assign_constant(1.0);
}

/// Input → hidden → output sigmoid network.
///
/// # Example
///
/// ```rust
/// use dualgrad::{NetworkConfig, NeuralNetwork};
///
/// let config = NetworkConfig::builder()
///     .input_neurons(4)
///     .hidden_neurons(3)
///     .output_neurons(2)
///     .init_seed(42)
///     .build()
///     .unwrap();
/// let network = NeuralNetwork::new(config).unwrap();
///
/// let input = [0.1, 0.2, 0.3, 0.4, 1.0]; // trailing bias input
/// let output = network.evaluate::<f64>(&input).unwrap();
/// assert_eq!(output.len(), 2);
/// assert!(output.iter().all(|&o| o > 0.0 && o < 1.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeuralNetwork {
    config: NetworkConfig,
    weights: Vec<f64>,
}

impl NeuralNetwork {
    /// Creates a network with weights drawn from N(0, 1).
    ///
    /// Uses `config.init_seed` when set, OS entropy otherwise.
    pub fn new(config: NetworkConfig) -> GradResult<Self> {
        let mut rng = match config.init_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, &mut rng)
    }

    /// Creates a network with weights drawn from N(0, 1) using `rng`.
    pub fn with_rng<R: Rng + ?Sized>(config: NetworkConfig, rng: &mut R) -> GradResult<Self> {
        config.validate()?;
        let weights = (0..config.num_weights())
            .map(|_| rng.sample::<f64, _>(StandardNormal))
            .collect();
        Ok(Self { config, weights })
    }

    /// Rebuilds a network from a flat weight vector in layout order.
    ///
    /// # Errors
    ///
    /// [`GradError::DimensionMismatch`] if `weights` does not match the
    /// configuration's weight count.
    pub fn from_weights(config: NetworkConfig, weights: Vec<f64>) -> GradResult<Self> {
        config.validate()?;
        if weights.len() != config.num_weights() {
            return Err(GradError::dimension_mismatch(
                config.num_weights(),
                weights.len(),
            ));
        }
        Ok(Self { config, weights })
    }

    /// Network shape.
    #[inline]
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Total weight count.
    #[inline]
    pub fn num_weights(&self) -> usize {
        self.weights.len()
    }

    /// Weights feeding the hidden layer.
    #[inline]
    pub fn num_hidden_weights(&self) -> usize {
        self.config.num_hidden_weights()
    }

    /// Weights feeding the output layer.
    #[inline]
    pub fn num_output_weights(&self) -> usize {
        self.config.num_output_weights()
    }

    /// All weights in layout order.
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weight at a layout index.
    #[inline]
    pub fn weight(&self, index: usize) -> f64 {
        self.weights[index]
    }

    /// Mutable weight at a layout index.
    #[inline]
    pub fn weight_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.weights[index]
    }

    /// Overwrites the weight at a layout index.
    #[inline]
    pub fn set_weight(&mut self, index: usize, value: f64) {
        self.weights[index] = value;
    }

    /// Arena elements one forward pass on `T` needs.
    pub fn evaluation_capacity<T: Scalar>(&self) -> usize {
        let activations = self.config.hidden_neurons + 1 + self.config.output_neurons + 1;
        if T::LIFTS_WEIGHTS {
            self.num_weights() + activations
        } else {
            activations
        }
    }

    /// Arena elements one backprop pass needs.
    pub fn backprop_capacity(&self) -> usize {
        let h = self.config.hidden_neurons;
        let o = self.config.output_neurons;
        (h + 1) + (o + 1) + o + h
    }

    fn check_input(&self, input: &[f64]) -> GradResult<()> {
        if input.len() != self.config.input_len() {
            return Err(GradError::dimension_mismatch(
                self.config.input_len(),
                input.len(),
            ));
        }
        Ok(())
    }

    fn check_label(&self, label: usize) -> GradResult<()> {
        if label >= self.config.output_neurons {
            return Err(GradError::label_out_of_range(
                label,
                self.config.output_neurons,
            ));
        }
        Ok(())
    }

    fn layer_weights<'a, T>(
        &'a self,
        before: &'a [T],
        lifted: Option<Span>,
        range: Range<usize>,
    ) -> Operands<'a, T> {
        match lifted {
            Some(span) => Operands::Scalar(&span.slice(before)[range]),
            None => Operands::Real(&self.weights[range]),
        }
    }

    /// Runs both layers into `arena`, which is reset first.
    fn forward_in<T: Scalar>(&self, input: &[f64], arena: &mut Arena<T>) -> GradResult<Activations> {
        self.check_input(input)?;
        arena.reset();

        let split = self.num_hidden_weights();
        let lifted = T::lift_weights(&self.weights, arena)?;
        let hidden = arena.allocate(self.config.hidden_neurons + 1, false)?;
        let output = arena.allocate(self.config.output_neurons + 1, false)?;

        {
            let (before, out) = arena.split_for_write(hidden);
            let weights = self.layer_weights(before, lifted, 0..split);
            evaluate_layer(Operands::Real(input), weights, out);
        }
        {
            let (before, out) = arena.split_for_write(output);
            let weights = self.layer_weights(before, lifted, split..self.weights.len());
            evaluate_layer(Operands::Scalar(hidden.slice(before)), weights, out);
        }

        Ok(Activations { hidden, output })
    }

    /// Output activations for `input` (pixels plus trailing bias).
    pub fn evaluate<T: Scalar>(&self, input: &[f64]) -> GradResult<Vec<T>> {
        T::with_thread_arena(self.evaluation_capacity::<T>(), |arena| {
            self.evaluate_in(input, arena)
        })
    }

    /// [`evaluate`](Self::evaluate) using `arena` for intermediates.
    pub fn evaluate_in<T: Scalar>(&self, input: &[f64], arena: &mut Arena<T>) -> GradResult<Vec<T>> {
        let acts = self.forward_in(input, arena)?;
        let output = arena.get(acts.output);
        Ok(output[..self.config.output_neurons].to_vec())
    }

    /// Mean squared error between the outputs and the one-hot target for
    /// `label`.
    ///
    /// The mean is accumulated as a running average,
    /// `cost = cost + (err² - cost) / (i + 1)`. With `T = DualNumber` the
    /// result's derivative `i` is `∂cost/∂w[i]`.
    pub fn evaluate_one_hot_cost<T: Scalar>(&self, input: &[f64], label: usize) -> GradResult<T> {
        T::with_thread_arena(self.evaluation_capacity::<T>(), |arena| {
            self.evaluate_one_hot_cost_in(input, label, arena)
        })
    }

    /// [`evaluate_one_hot_cost`](Self::evaluate_one_hot_cost) using `arena`
    /// for intermediates.
    pub fn evaluate_one_hot_cost_in<T: Scalar>(
        &self,
        input: &[f64],
        label: usize,
        arena: &mut Arena<T>,
    ) -> GradResult<T> {
        self.check_label(label)?;
        let acts = self.forward_in(input, arena)?;
        let output = &arena.get(acts.output)[..self.config.output_neurons];

        let mut cost = T::from_f64(0.0);
        for (i, o) in output.iter().enumerate() {
            let target = if i == label { 1.0 } else { 0.0 };
            let error = o.clone() - target;
            let squared = error.clone() * error;
            let step = (squared - cost.clone()) * (1.0 / (i + 1) as f64);
            cost = cost + step;
        }
        Ok(cost)
    }

    /// Full gradient of the one-hot cost by analytic backpropagation.
    pub fn forward_pass_and_backprop(&self, input: &[f64], label: usize) -> GradResult<Vec<f64>> {
        f64::with_thread_arena(self.backprop_capacity(), |arena| {
            self.forward_pass_and_backprop_in(input, label, arena)
        })
    }

    /// [`forward_pass_and_backprop`](Self::forward_pass_and_backprop) using
    /// `arena` for intermediates.
    pub fn forward_pass_and_backprop_in(
        &self,
        input: &[f64],
        label: usize,
        arena: &mut Arena<f64>,
    ) -> GradResult<Vec<f64>> {
        self.check_label(label)?;
        let acts = self.forward_in(input, arena)?;

        let hidden_count = self.config.hidden_neurons;
        let output_count = self.config.output_neurons;
        let output_delta = arena.allocate(output_count, false)?;
        let hidden_delta = arena.allocate(hidden_count, false)?;

        // dC/dZ at the output: d(mean err²)/do times the sigmoid slope.
        let scale = 2.0 / output_count as f64;
        {
            let (before, delta) = arena.split_for_write(output_delta);
            let output = acts.output.slice(before);
            for (k, d) in delta.iter_mut().enumerate() {
                let o = output[k];
                let target = if k == label { 1.0 } else { 0.0 };
                *d = scale * (o - target) * o * (1.0 - o);
            }
        }

        // dC/dZ at the hidden layer, bias weights excluded.
        let output_weights = &self.weights[self.num_hidden_weights()..];
        {
            let (before, delta) = arena.split_for_write(hidden_delta);
            let hidden = acts.hidden.slice(before);
            let downstream = output_delta.slice(before);
            for (j, d) in delta.iter_mut().enumerate() {
                let sum: f64 = downstream
                    .iter()
                    .enumerate()
                    .map(|(k, dk)| dk * output_weights[k * (hidden_count + 1) + j])
                    .sum();
                let h = hidden[j];
                *d = sum * h * (1.0 - h);
            }
        }

        let mut gradient = vec![0.0; self.num_weights()];
        let (hidden_grad, output_grad) = gradient.split_at_mut(self.num_hidden_weights());

        for (row, &d) in hidden_grad
            .chunks_exact_mut(input.len())
            .zip(arena.get(hidden_delta))
        {
            for (g, &x) in row.iter_mut().zip(input) {
                *g = d * x;
            }
        }

        let hidden = arena.get(acts.hidden);
        for (row, &d) in output_grad
            .chunks_exact_mut(hidden_count + 1)
            .zip(arena.get(output_delta))
        {
            for (g, &h) in row.iter_mut().zip(hidden) {
                *g = d * h;
            }
        }

        Ok(gradient)
    }

    /// Index of the most activated output neuron; the first one wins ties.
    pub fn evaluate_one_hot(&self, input: &[f64]) -> GradResult<usize> {
        let output = self.evaluate::<f64>(input)?;
        let mut best = 0;
        for (i, &o) in output.iter().enumerate() {
            if o > output[best] {
                best = i;
            }
        }
        Ok(best)
    }

    /// `w[i] -= gradient[i] * learning_rate`.
    ///
    /// A gradient of the wrong length is logged and ignored.
    pub fn update_weights(&mut self, gradient: &[f64], learning_rate: f64) {
        if let Err(err) = self.try_update_weights(gradient, learning_rate) {
            log::error!("update_weights ignored: {}", err);
        }
    }

    /// Like [`update_weights`](Self::update_weights), but reports a length
    /// mismatch.
    pub fn try_update_weights(&mut self, gradient: &[f64], learning_rate: f64) -> GradResult<()> {
        if gradient.len() != self.weights.len() {
            return Err(GradError::dimension_mismatch(
                self.weights.len(),
                gradient.len(),
            ));
        }
        for (w, g) in self.weights.iter_mut().zip(gradient) {
            *w -= g * learning_rate;
        }
        Ok(())
    }

    /// Gradient of the one-hot cost read off a single dual-number pass.
    pub fn dual_gradient(&self, input: &[f64], label: usize) -> GradResult<Vec<f64>> {
        let cost = self.evaluate_one_hot_cost::<DualNumber>(input, label)?;
        Ok(cost.gradient(self.num_weights()))
    }

    /// Saves network to bytes using bincode.
    #[cfg(feature = "serde")]
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Loads network from bytes using bincode.
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tiny(seed: u64) -> NeuralNetwork {
        let config = NetworkConfig::builder()
            .input_neurons(2)
            .hidden_neurons(2)
            .output_neurons(2)
            .init_seed(seed)
            .build()
            .unwrap();
        NeuralNetwork::new(config).unwrap()
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    #[test]
    fn test_weight_count() {
        let net = tiny(1);
        assert_eq!(net.num_weights(), 12);
        assert_eq!(net.num_hidden_weights(), 6);
        assert_eq!(net.num_output_weights(), 6);
    }

    #[test]
    fn test_seeded_init_is_deterministic() {
        assert_eq!(tiny(5).weights(), tiny(5).weights());
        assert_ne!(tiny(5).weights(), tiny(6).weights());
    }

    #[test]
    fn test_evaluate_by_hand() {
        let config = NetworkConfig::builder()
            .input_neurons(2)
            .hidden_neurons(2)
            .output_neurons(2)
            .build()
            .unwrap();
        let weights = vec![
            // hidden 0: x0, x1, bias
            0.1, 0.2, 0.3,
            // hidden 1
            -0.4, 0.5, -0.6,
            // output 0: h0, h1, bias
            0.7, -0.8, 0.9,
            // output 1
            1.0, 1.1, -1.2,
        ];
        let net = NeuralNetwork::from_weights(config, weights).unwrap();
        let input = [0.5, 0.25, 1.0];

        let h0 = sigmoid(0.1 * 0.5 + 0.2 * 0.25 + 0.3);
        let h1 = sigmoid(-0.4 * 0.5 + 0.5 * 0.25 - 0.6);
        let o0 = sigmoid(0.7 * h0 - 0.8 * h1 + 0.9);
        let o1 = sigmoid(1.0 * h0 + 1.1 * h1 - 1.2);

        let out = net.evaluate::<f64>(&input).unwrap();
        assert_relative_eq!(out[0], o0, epsilon = 1e-14);
        assert_relative_eq!(out[1], o1, epsilon = 1e-14);

        let cost = net.evaluate_one_hot_cost::<f64>(&input, 1).unwrap();
        let expected = (o0 * o0 + (o1 - 1.0) * (o1 - 1.0)) / 2.0;
        assert_relative_eq!(cost, expected, epsilon = 1e-14);
    }

    #[test]
    fn test_dual_real_matches_plain() {
        let net = tiny(3);
        let input = [0.2, 0.9, 1.0];
        let plain = net.evaluate_one_hot_cost::<f64>(&input, 0).unwrap();
        let dual = net.evaluate_one_hot_cost::<DualNumber>(&input, 0).unwrap();
        assert_relative_eq!(plain, dual.real(), epsilon = 1e-12);
    }

    #[test]
    fn test_backprop_matches_dual() {
        let net = tiny(11);
        let input = [0.3, 0.6, 1.0];
        let backprop = net.forward_pass_and_backprop(&input, 1).unwrap();
        let dual = net.dual_gradient(&input, 1).unwrap();
        for (b, d) in backprop.iter().zip(&dual) {
            assert_relative_eq!(b, d, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_wrong_input_length() {
        let net = tiny(1);
        assert!(matches!(
            net.evaluate::<f64>(&[0.5, 1.0]),
            Err(GradError::DimensionMismatch { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn test_label_checked() {
        let net = tiny(1);
        assert!(net.forward_pass_and_backprop(&[0.5, 0.5, 1.0], 2).is_err());
        assert!(net.evaluate_one_hot_cost::<f64>(&[0.5, 0.5, 1.0], 5).is_err());
    }

    #[test]
    fn test_small_arena_aborts() {
        let net = tiny(1);
        let mut arena = Arena::<DualNumber>::new(net.evaluation_capacity::<DualNumber>() - 1);
        let result = net.evaluate_one_hot_cost_in(&[0.5, 0.5, 1.0], 0, &mut arena);
        assert!(result.unwrap_err().is_evaluation_abort());

        let mut arena = Arena::<f64>::new(net.backprop_capacity() - 1);
        assert!(net
            .forward_pass_and_backprop_in(&[0.5, 0.5, 1.0], 0, &mut arena)
            .is_err());
    }

    #[test]
    fn test_explicit_arena_reuse_is_bit_identical() {
        let net = tiny(9);
        let input = [0.1, 0.7, 1.0];
        let mut arena = Arena::<DualNumber>::new(net.evaluation_capacity::<DualNumber>());
        let first = net.evaluate_one_hot_cost_in(&input, 0, &mut arena).unwrap();
        let second = net.evaluate_one_hot_cost_in(&input, 0, &mut arena).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_update_weights() {
        let mut net = tiny(2);
        let before = net.weights().to_vec();
        let gradient = vec![1.0; net.num_weights()];
        net.update_weights(&gradient, 0.5);
        for (a, b) in net.weights().iter().zip(&before) {
            assert_relative_eq!(*a, b - 0.5);
        }
    }

    #[test]
    fn test_update_weights_mismatch_is_noop() {
        let mut net = tiny(2);
        let before = net.clone();
        net.update_weights(&[1.0; 11], 0.5);
        assert_eq!(net, before);
        assert!(net.try_update_weights(&[1.0; 13], 0.5).is_err());
    }

    #[test]
    fn test_from_weights_rejects_length() {
        let config = tiny(1).config().clone();
        assert!(NeuralNetwork::from_weights(config, vec![0.0; 11]).is_err());
    }

    #[test]
    fn test_one_hot_first_wins() {
        let config = NetworkConfig::builder()
            .input_neurons(1)
            .hidden_neurons(1)
            .output_neurons(3)
            .build()
            .unwrap();
        // Outputs 0 and 2 share weights, output 1 is lower.
        let weights = vec![0.0, 0.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0];
        let net = NeuralNetwork::from_weights(config, weights).unwrap();
        assert_eq!(net.evaluate_one_hot(&[0.5, 1.0]).unwrap(), 0);
    }
}
