//! Weight and accuracy persistence.
//!
//! - binary: every weight as a little-endian `f64`, in layout order, no header
//! - weights CSV: one `"<label>","<value>"` row per weight, in layout order
//! - accuracy CSV: `"Epoch","<name>"` header, then one row per epoch
//!
//! All writers take any [`Write`]; wrap files in a `BufWriter`.

use std::io::{Read, Write};

use crate::config::NetworkConfig;
use crate::error::{GradError, GradResult};
use crate::network::NeuralNetwork;
use crate::train::Accuracy;

const F64_BYTES: usize = std::mem::size_of::<f64>();

/// Writes the raw weight vector.
pub fn write_weights_binary<W: Write>(network: &NeuralNetwork, mut writer: W) -> GradResult<()> {
    for w in network.weights() {
        writer.write_all(&w.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a weight vector written by [`write_weights_binary`].
///
/// # Errors
///
/// [`GradError::DimensionMismatch`] (counted in weights) if the stream
/// does not hold exactly `config.num_weights()` values.
pub fn read_weights_binary<R: Read>(config: NetworkConfig, mut reader: R) -> GradResult<NeuralNetwork> {
    let mut bytes = Vec::with_capacity(config.num_weights() * F64_BYTES);
    reader.read_to_end(&mut bytes)?;

    if bytes.len() != config.num_weights() * F64_BYTES {
        return Err(GradError::dimension_mismatch(
            config.num_weights(),
            bytes.len() / F64_BYTES,
        ));
    }

    let weights = bytes
        .chunks_exact(F64_BYTES)
        .map(|chunk| {
            let mut raw = [0u8; F64_BYTES];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();
    NeuralNetwork::from_weights(config, weights)
}

/// Human-readable name of the weight at layout `index`.
///
/// ```rust
/// use dualgrad::{weight_label, NetworkConfig};
///
/// let config = NetworkConfig::builder()
///     .input_neurons(2)
///     .hidden_neurons(2)
///     .output_neurons(2)
///     .build()
///     .unwrap();
/// assert_eq!(weight_label(&config, 0), "Input0 to Hidden0 Weight");
/// assert_eq!(weight_label(&config, 2), "Hidden0 Bias");
/// assert_eq!(weight_label(&config, 7), "Hidden1 to Output0 Weight");
/// assert_eq!(weight_label(&config, 11), "Output1 Bias");
/// ```
pub fn weight_label(config: &NetworkConfig, index: usize) -> String {
    let hidden_weights = config.num_hidden_weights();
    if index < hidden_weights {
        let row = config.input_neurons + 1;
        let (neuron, input) = (index / row, index % row);
        if input == config.input_neurons {
            format!("Hidden{} Bias", neuron)
        } else {
            format!("Input{} to Hidden{} Weight", input, neuron)
        }
    } else {
        let row = config.hidden_neurons + 1;
        let local = index - hidden_weights;
        let (neuron, hidden) = (local / row, local % row);
        if hidden == config.hidden_neurons {
            format!("Output{} Bias", neuron)
        } else {
            format!("Hidden{} to Output{} Weight", hidden, neuron)
        }
    }
}

/// Writes one labelled row per weight.
pub fn write_weights_csv<W: Write>(network: &NeuralNetwork, mut writer: W) -> GradResult<()> {
    for (index, w) in network.weights().iter().enumerate() {
        writeln!(
            writer,
            "\"{}\",\"{:.6}\"",
            weight_label(network.config(), index),
            w
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the per-epoch accuracy percentages under a `name` column.
pub fn write_accuracy_csv<W: Write>(name: &str, accuracy: &[Accuracy], mut writer: W) -> GradResult<()> {
    writeln!(writer, "\"Epoch\",\"{}\"", name)?;
    for (epoch, acc) in accuracy.iter().enumerate() {
        writeln!(writer, "\"{}\",\"{:.6}\"", epoch + 1, acc.percent())?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> NeuralNetwork {
        let config = NetworkConfig::builder()
            .input_neurons(2)
            .hidden_neurons(2)
            .output_neurons(2)
            .init_seed(4)
            .build()
            .unwrap();
        NeuralNetwork::new(config).unwrap()
    }

    #[test]
    fn test_binary_round_trip_is_exact() {
        let net = network();
        let mut bytes = Vec::new();
        write_weights_binary(&net, &mut bytes).unwrap();
        assert_eq!(bytes.len(), 12 * 8);

        let loaded = read_weights_binary(net.config().clone(), bytes.as_slice()).unwrap();
        assert_eq!(loaded.weights(), net.weights());
    }

    #[test]
    fn test_binary_little_endian_layout() {
        let net = network();
        let mut bytes = Vec::new();
        write_weights_binary(&net, &mut bytes).unwrap();
        assert_eq!(&bytes[8..16], &net.weight(1).to_le_bytes());
    }

    #[test]
    fn test_binary_length_checked() {
        let net = network();
        let mut bytes = Vec::new();
        write_weights_binary(&net, &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 8);
        assert!(matches!(
            read_weights_binary(net.config().clone(), bytes.as_slice()),
            Err(GradError::DimensionMismatch { expected: 12, got: 11 })
        ));
    }

    #[test]
    fn test_weights_csv_rows() {
        let net = network();
        let mut out = Vec::new();
        write_weights_csv(&net, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), net.num_weights());
        assert!(lines[0].starts_with("\"Input0 to Hidden0 Weight\",\""));
        assert!(lines[5].starts_with("\"Hidden1 Bias\""));
        assert!(lines[6].starts_with("\"Hidden0 to Output0 Weight\""));
    }

    #[test]
    fn test_accuracy_csv() {
        let acc = [
            Accuracy {
                correct: 1,
                total: 2,
            },
            Accuracy {
                correct: 2,
                total: 2,
            },
        ];
        let mut out = Vec::new();
        write_accuracy_csv("Backprop", &acc, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "\"Epoch\",\"Backprop\"\n\"1\",\"50.000000\"\n\"2\",\"100.000000\"\n"
        );
    }
}
