//! Adaptive bias reflective correction library
//!
//! This library implements a statistical correction unit for sequence models.
//! Each forward call observes a `[batch, seq, hidden_dim]` batch, estimates how far
//! its projected distribution has drifted from a reference Gaussian, optionally
//! nudges the batch back toward the reference, and finally applies a feature-wise
//! normalization with learnable affine parameters.
//!
//! Components, leaves first:
//!
//! - projection::Projector: gated linear map into the reference space
//! - divergence::DivergenceEstimator: closed-form Gaussian KL against the reference
//! - ewma::EmaTracker / ewma::AdaptivityControl: drift tracking and hysteresis
//! - correction: validated correction attempts, quantized history and rollback
//! - normalize::Normalizer: per-token normalization with gamma/beta
//! - layer::AdaptiveBiasLayer: the per-call state machine tying them together
//!
//! Tensor arithmetic is delegated to Burn on the ndarray CPU backend.

pub mod constants;
pub mod correction;
pub mod divergence;
pub mod ewma;
pub mod layer;
pub mod normalize;
pub mod projection;

use burn::tensor::Tensor;
use burn_ndarray::{NdArray, NdArrayDevice};

pub use layer::{
    AdaptiveBiasLayer, ConfigError, ConfigWarning, Diagnostics, DiagnosticsSummary,
    ForwardOutput, LayerConfig, LayerError, Mode,
};

/// Tensor backend used by every component
pub type Backend = NdArray<f32>;

/// Device type of [`Backend`]
pub type Device = NdArrayDevice;

/// Read a single-element tensor back as a host scalar
pub(crate) fn scalar(tensor: Tensor<Backend, 1>) -> f64 {
    tensor.into_scalar() as f64
}

/// Copy a tensor's contents into a flat host vector (row-major)
pub fn to_vec<const D: usize>(tensor: Tensor<Backend, D>) -> Result<Vec<f32>, LayerError> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| LayerError::TensorData(format!("{:?}", e)))
}
