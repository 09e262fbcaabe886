use burn::tensor::Tensor;
use serde::Serialize;

use super::error::LayerError;
use crate::{Backend, to_vec};

/// Result of a forward call, selected by the caller's `return_dict` flag
#[derive(Debug, Clone)]
pub enum ForwardOutput {
    Tensor(Tensor<Backend, 3>),
    Diagnostics(Box<Diagnostics>),
}

impl ForwardOutput {
    /// Normalized output, whichever variant was requested
    pub fn output(&self) -> &Tensor<Backend, 3> {
        match self {
            ForwardOutput::Tensor(output) => output,
            ForwardOutput::Diagnostics(diagnostics) => &diagnostics.output,
        }
    }

    pub fn into_output(self) -> Tensor<Backend, 3> {
        match self {
            ForwardOutput::Tensor(output) => output,
            ForwardOutput::Diagnostics(diagnostics) => diagnostics.output,
        }
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            ForwardOutput::Tensor(_) => None,
            ForwardOutput::Diagnostics(diagnostics) => Some(diagnostics),
        }
    }
}

/// Structured record of one forward call
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Normalized output: [batch, seq, hidden_dim]
    pub output: Tensor<Backend, 3>,

    /// Raw divergence per evaluated scale, in scale order
    pub kl_values: Vec<f64>,

    /// Quantized corrections accepted during the call, each [hidden_dim]
    pub corrections: Vec<Tensor<Backend, 1>>,

    pub kl_ema: f64,
    pub variance_ema: f64,

    /// Snapshot of the reference mean: [ref_dim]
    pub ref_mu: Tensor<Backend, 1>,

    /// Snapshot of the reference spread: [ref_dim]
    pub ref_sigma: Tensor<Backend, 1>,

    pub correction_count: usize,

    /// Whether the reference was adapting when the call finished
    pub reference_adapting: bool,
}

impl Diagnostics {
    /// Host-side copy with tensors flattened into plain vectors
    pub fn summary(&self) -> Result<DiagnosticsSummary, LayerError> {
        Ok(DiagnosticsSummary {
            output_shape: self.output.dims(),
            kl_values: self.kl_values.clone(),
            corrections: self
                .corrections
                .iter()
                .map(|correction| to_vec(correction.clone()))
                .collect::<Result<_, _>>()?,
            kl_ema: self.kl_ema,
            variance_ema: self.variance_ema,
            ref_mu: to_vec(self.ref_mu.clone())?,
            ref_sigma: to_vec(self.ref_sigma.clone())?,
            correction_count: self.correction_count,
            reference_adapting: self.reference_adapting,
        })
    }
}

/// Serializable diagnostics without the output tensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsSummary {
    pub output_shape: [usize; 3],
    pub kl_values: Vec<f64>,
    pub corrections: Vec<Vec<f32>>,
    pub kl_ema: f64,
    pub variance_ema: f64,
    pub ref_mu: Vec<f32>,
    pub ref_sigma: Vec<f32>,
    pub correction_count: usize,
    pub reference_adapting: bool,
}
