//! Unified error types for dualgrad.
//!
//! This module provides [`GradError`], the single error type returned by
//! every fallible operation in the crate. It uses the `thiserror` crate for
//! ergonomic error handling.
//!
//! Numeric edge cases (division by a zero-valued dual number, overflow) are
//! deliberately absent: they propagate as IEEE `inf`/`NaN` so that all four
//! gradient strategies degrade the same way.
//!
//! # Example
//!
//! ```rust
//! use dualgrad::GradError;
//!
//! fn check_gradient(expected: usize, got: &[f64]) -> Result<(), GradError> {
//!     if got.len() != expected {
//!         return Err(GradError::dimension_mismatch(expected, got.len()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_gradient(3, &[0.0; 2]).is_err());
//! ```

use thiserror::Error;

use crate::config::ConfigError;

/// Unified error type for dualgrad operations.
#[derive(Error, Debug)]
pub enum GradError {
    /// The arena cannot hand out the requested span.
    ///
    /// Fatal for the current evaluation: the sample is aborted, never
    /// evaluated against zero-filled or stale memory.
    #[error("Arena exhausted: requested {requested} elements, {remaining} remaining")]
    ArenaExhausted {
        /// Number of elements requested.
        requested: usize,
        /// Number of elements still free in the arena.
        remaining: usize,
    },

    /// A vector does not have the length the network shape requires.
    ///
    /// Raised for sample pixel arrays, gradient vectors and persisted
    /// weight vectors.
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length received.
        got: usize,
    },

    /// A sample label does not name an output neuron.
    #[error("Label {label} out of range for {outputs} output neurons")]
    LabelOutOfRange {
        /// Label found on the sample.
        label: usize,
        /// Number of output neurons.
        outputs: usize,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error during weight or report persistence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A dedicated worker pool could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// A gradient strategy name did not parse.
    #[error("Unknown gradient strategy: {0}")]
    UnknownStrategy(String),
}

/// Result type alias for dualgrad operations.
pub type GradResult<T> = Result<T, GradError>;

impl GradError {
    /// Creates an arena exhaustion error.
    pub fn arena_exhausted(requested: usize, remaining: usize) -> Self {
        GradError::ArenaExhausted {
            requested,
            remaining,
        }
    }

    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        GradError::DimensionMismatch { expected, got }
    }

    /// Creates a label out of range error.
    pub fn label_out_of_range(label: usize, outputs: usize) -> Self {
        GradError::LabelOutOfRange { label, outputs }
    }

    /// Creates a thread pool error.
    pub fn thread_pool<S: Into<String>>(msg: S) -> Self {
        GradError::ThreadPool(msg.into())
    }

    /// Creates an unknown strategy error.
    pub fn unknown_strategy<S: Into<String>>(name: S) -> Self {
        GradError::UnknownStrategy(name.into())
    }

    /// Returns true if this error aborted a single evaluation rather than
    /// signalling a caller contract violation.
    pub fn is_evaluation_abort(&self) -> bool {
        matches!(self, GradError::ArenaExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_exhausted() {
        let err = GradError::arena_exhausted(12, 4);
        let msg = err.to_string();
        assert!(msg.contains("Arena exhausted"));
        assert!(msg.contains("12"));
        assert!(msg.contains('4'));
        assert!(err.is_evaluation_abort());
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = GradError::dimension_mismatch(12, 11);
        let msg = err.to_string();
        assert!(msg.contains("Dimension mismatch"));
        assert!(msg.contains("12"));
        assert!(msg.contains("11"));
        assert!(!err.is_evaluation_abort());
    }

    #[test]
    fn test_label_out_of_range() {
        let err = GradError::label_out_of_range(10, 10);
        assert!(err.to_string().contains("Label 10"));
    }

    #[test]
    fn test_config_error() {
        let err = GradError::from(ConfigError::InvalidDimension("hidden_neurons must be > 0"));
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let err = GradError::from(io);
        assert!(err.to_string().contains("short read"));
    }
}
