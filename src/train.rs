//! Mini-batch SGD driver.
//!
//! [`Trainer`] runs any gradient strategy over a training set:
//!
//! 1. shuffle the sample order (once per epoch),
//! 2. sum the per-sample gradients of each mini-batch,
//! 3. step the weights by `learning_rate / batch_len` times that sum,
//! 4. measure accuracy on the test set after every epoch.
//!
//! # Example
//!
//! ```rust
//! use dualgrad::{
//!     GradientStrategy, LabeledImage, NetworkConfig, NeuralNetwork, Trainer, TrainingConfig,
//! };
//!
//! let config = NetworkConfig::builder()
//!     .input_neurons(2)
//!     .hidden_neurons(4)
//!     .output_neurons(2)
//!     .init_seed(3)
//!     .build()
//!     .unwrap();
//! let mut network = NeuralNetwork::new(config).unwrap();
//!
//! let data: Vec<LabeledImage> = (0..20)
//!     .map(|i| {
//!         let x = i as f64 / 20.0;
//!         LabeledImage::new(usize::from(x > 0.5), vec![x, 1.0 - x])
//!     })
//!     .collect();
//!
//! let trainer = Trainer::new(TrainingConfig {
//!     epochs: 2,
//!     shuffle_seed: Some(0),
//!     ..Default::default()
//! });
//! let report = trainer
//!     .train(&mut network, &data, &data, GradientStrategy::Backprop)
//!     .unwrap();
//! assert_eq!(report.epoch_accuracy.len(), 2);
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::TrainingConfig;
use crate::error::{GradError, GradResult};
use crate::gradient::{GradientStrategy, GradientVector};
use crate::network::NeuralNetwork;
use crate::sample::LabeledImage;

/// Correct predictions out of a test set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Accuracy {
    /// Samples whose predicted label matched.
    pub correct: usize,
    /// Samples evaluated.
    pub total: usize,
}

impl Accuracy {
    /// Percentage of correct predictions; `0.0` for an empty set.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.correct as f64 / self.total as f64
    }

    /// Number of wrong predictions.
    pub fn incorrect(&self) -> usize {
        self.total - self.correct
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}% ({} incorrect)", self.percent(), self.incorrect())
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Name of the gradient strategy used.
    pub strategy: String,
    /// Test accuracy after each epoch.
    pub epoch_accuracy: Vec<Accuracy>,
    /// Wall-clock time of the whole run.
    pub duration: Duration,
}

impl TrainingReport {
    /// Accuracy after the last epoch.
    pub fn final_accuracy(&self) -> Accuracy {
        self.epoch_accuracy.last().copied().unwrap_or_default()
    }
}

/// Progress notifications emitted while training.
#[derive(Debug, Clone, Copy)]
pub enum TrainingEvent {
    /// A mini-batch has been applied.
    Batch {
        /// Zero-based epoch.
        epoch: usize,
        /// Samples processed so far in this epoch.
        processed: usize,
        /// Samples per epoch.
        total: usize,
    },
    /// An epoch has finished and been evaluated.
    Epoch {
        /// Zero-based epoch.
        epoch: usize,
        /// Test accuracy after the epoch.
        accuracy: Accuracy,
        /// Time spent on the epoch's training.
        duration: Duration,
    },
}

/// Mini-batch SGD driver.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    /// Creates a trainer.
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Training settings.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Trains `network` with a built-in strategy.
    pub fn train(
        &self,
        network: &mut NeuralNetwork,
        training: &[LabeledImage],
        testing: &[LabeledImage],
        strategy: GradientStrategy,
    ) -> GradResult<TrainingReport> {
        self.train_with(
            network,
            training,
            testing,
            strategy.name(),
            strategy.gradient_fn(),
            |_| {},
        )
    }

    /// Trains `network` with any gradient function, reporting progress to
    /// `observer`.
    ///
    /// # Errors
    ///
    /// Stops at the first sample whose gradient fails and returns that
    /// error; updates already applied are kept. A gradient whose length is
    /// not the network's weight count fails with
    /// [`GradError::DimensionMismatch`] before the batch is applied.
    pub fn train_with<G, O>(
        &self,
        network: &mut NeuralNetwork,
        training: &[LabeledImage],
        testing: &[LabeledImage],
        name: &str,
        mut gradient: G,
        mut observer: O,
    ) -> GradResult<TrainingReport>
    where
        G: FnMut(&mut NeuralNetwork, &LabeledImage) -> GradResult<GradientVector>,
        O: FnMut(TrainingEvent),
    {
        self.config.validate()?;
        let start = Instant::now();

        let mut rng = match self.config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut order: Vec<usize> = (0..training.len()).collect();
        let mut gradient_sum = vec![0.0; network.num_weights()];
        let mut epoch_accuracy = Vec::with_capacity(self.config.epochs);

        log::info!(
            "Training {} for {} epochs on {} samples ({} weights)",
            name,
            self.config.epochs,
            training.len(),
            network.num_weights()
        );

        for epoch in 0..self.config.epochs {
            let epoch_start = Instant::now();
            order.shuffle(&mut rng);

            let mut processed = 0;
            for batch in order.chunks(self.config.mini_batch_size) {
                gradient_sum.fill(0.0);
                for &index in batch {
                    let g = gradient(&mut *network, &training[index])?;
                    if g.len() != gradient_sum.len() {
                        log::error!(
                            "{} returned {} partials for {} weights",
                            name,
                            g.len(),
                            gradient_sum.len()
                        );
                        return Err(GradError::dimension_mismatch(gradient_sum.len(), g.len()));
                    }
                    for (sum, g) in gradient_sum.iter_mut().zip(&g) {
                        *sum += g;
                    }
                }
                network.update_weights(
                    &gradient_sum,
                    self.config.learning_rate / batch.len() as f64,
                );

                processed += batch.len();
                observer(TrainingEvent::Batch {
                    epoch,
                    processed,
                    total: training.len(),
                });
            }

            let duration = epoch_start.elapsed();
            let accuracy = evaluate_accuracy(network, testing)?;
            log::info!(
                "[Epoch {}/{}] Duration: {} Accuracy: {}",
                epoch + 1,
                self.config.epochs,
                format_duration(duration),
                accuracy
            );
            observer(TrainingEvent::Epoch {
                epoch,
                accuracy,
                duration,
            });
            epoch_accuracy.push(accuracy);
        }

        let duration = start.elapsed();
        log::info!("[Total] {} Duration: {}", name, format_duration(duration));

        Ok(TrainingReport {
            strategy: name.to_string(),
            epoch_accuracy,
            duration,
        })
    }
}

/// Counts the samples whose arg-max output matches their label.
pub fn evaluate_accuracy(network: &NeuralNetwork, samples: &[LabeledImage]) -> GradResult<Accuracy> {
    let correct = samples
        .par_iter()
        .map(|sample| -> GradResult<usize> {
            let predicted = network.evaluate_one_hot(&sample.pixels)?;
            Ok(usize::from(predicted == sample.label))
        })
        .try_reduce(|| 0, |a, b| Ok(a + b))?;

    Ok(Accuracy {
        correct,
        total: samples.len(),
    })
}

/// Renders a duration as `HH:MM:SS`.
///
/// ```rust
/// use std::time::Duration;
/// use dualgrad::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(3725)), "01:02:05");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
