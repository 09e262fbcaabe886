//! Error handling for the adaptive layer
//!
//! Construction can fail on invalid configuration; forward calls only fail when the
//! caller hands in tensors whose shapes disagree with the configuration.

use thiserror::Error;

/// Configuration validation errors (fatal at construction time)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value}")]
    InvalidDimension { name: &'static str, value: usize },

    #[error("eps must be positive, got {0}")]
    InvalidEps(f64),

    #[error("compression_factor must be finite and nonzero, got {0}")]
    InvalidCompressionFactor(f64),

    #[error("failed to parse layer configuration: {0}")]
    Parse(String),
}

/// Error types for adaptive layer operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    #[error("layer configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input feature axis does not match `hidden_dim`
    #[error("input feature dimension {actual} does not match hidden_dim {expected}")]
    InputShape { expected: usize, actual: usize },

    /// A host-supplied parameter has the wrong shape
    #[error("parameter `{name}` expects shape {expected:?}, got {actual:?}")]
    ParameterShape {
        name: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("parameter initialization failed: {0}")]
    Initialization(String),

    #[error("tensor data error: {0}")]
    TensorData(String),
}

impl LayerError {
    /// Build a shape error for a parameter
    pub(crate) fn parameter_shape(
        name: &'static str,
        expected: &[usize],
        actual: &[usize],
    ) -> Self {
        LayerError::ParameterShape {
            name,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
