//! Labeled input samples.

use crate::config::NetworkConfig;
use crate::error::{GradError, GradResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One training or test example.
///
/// `pixels` holds the input activations in `[0, 1]` followed by a constant
/// `1.0` feeding the hidden layer's bias weights.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabeledImage {
    /// Index of the correct output neuron.
    pub label: usize,

    /// Input activations plus the trailing bias `1.0`.
    pub pixels: Vec<f64>,
}

impl LabeledImage {
    /// Creates a sample from raw input activations, appending the bias.
    ///
    /// ```rust
    /// use dualgrad::LabeledImage;
    ///
    /// let sample = LabeledImage::new(3, vec![0.0, 0.5]);
    /// assert_eq!(sample.pixels, vec![0.0, 0.5, 1.0]);
    /// assert_eq!(sample.inputs(), &[0.0, 0.5]);
    /// ```
    pub fn new(label: usize, mut pixels: Vec<f64>) -> Self {
        pixels.push(1.0);
        Self { label, pixels }
    }

    /// Input activations without the bias entry.
    pub fn inputs(&self) -> &[f64] {
        match self.pixels.split_last() {
            Some((_, inputs)) => inputs,
            None => &[],
        }
    }

    /// Checks the pixel count and label against a network shape.
    ///
    /// # Errors
    ///
    /// [`GradError::DimensionMismatch`] if `pixels` is not `inputs + 1`
    /// long, [`GradError::LabelOutOfRange`] if the label does not name an
    /// output neuron.
    pub fn validate(&self, config: &NetworkConfig) -> GradResult<()> {
        if self.pixels.len() != config.input_len() {
            return Err(GradError::dimension_mismatch(
                config.input_len(),
                self.pixels.len(),
            ));
        }
        if self.label >= config.output_neurons {
            return Err(GradError::label_out_of_range(
                self.label,
                config.output_neurons,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> NetworkConfig {
        NetworkConfig::builder()
            .input_neurons(2)
            .hidden_neurons(2)
            .output_neurons(2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_bias_appended() {
        let sample = LabeledImage::new(1, vec![0.25, 0.75]);
        assert_eq!(sample.pixels.len(), 3);
        assert_eq!(*sample.pixels.last().unwrap(), 1.0);
        assert!(sample.validate(&tiny()).is_ok());
    }

    #[test]
    fn test_wrong_pixel_count() {
        let sample = LabeledImage::new(0, vec![0.25; 3]);
        assert!(matches!(
            sample.validate(&tiny()),
            Err(GradError::DimensionMismatch { expected: 3, got: 4 })
        ));
    }

    #[test]
    fn test_label_out_of_range() {
        let sample = LabeledImage::new(2, vec![0.25, 0.75]);
        assert!(matches!(
            sample.validate(&tiny()),
            Err(GradError::LabelOutOfRange { label: 2, outputs: 2 })
        ));
    }
}
