//! Diagnostics record returned to Python
//!
//! A host-side copy of [`policy::Diagnostics`]: every tensor is flattened into
//! nested lists so the object can outlive the layer that produced it.

use policy::{Diagnostics, DiagnosticsSummary, LayerError, to_vec};
use pyo3::prelude::*;

use super::conversions::{ConversionResult, nested_from_tensor, vectors};

/// Result of `AdaptiveBiasLayer.forward(x, return_dict=True)`
#[pyclass(name = "Diagnostics")]
#[derive(Debug, Clone)]
pub struct PyDiagnostics {
    /// Normalized output, `[batch][seq][hidden]`
    #[pyo3(get)]
    pub output: Vec<Vec<Vec<f32>>>,

    /// Raw divergence per evaluated scale
    #[pyo3(get)]
    pub kl_values: Vec<f64>,

    /// Quantized corrections accepted during the call
    #[pyo3(get)]
    pub corrections: Vec<Vec<f32>>,

    #[pyo3(get)]
    pub kl_ema: f64,

    #[pyo3(get)]
    pub variance_ema: f64,

    #[pyo3(get)]
    pub ref_mu: Vec<f32>,

    #[pyo3(get)]
    pub ref_sigma: Vec<f32>,

    #[pyo3(get)]
    pub correction_count: usize,

    #[pyo3(get)]
    pub reference_adapting: bool,
}

impl TryFrom<Diagnostics> for PyDiagnostics {
    type Error = LayerError;

    fn try_from(diagnostics: Diagnostics) -> Result<Self, Self::Error> {
        Ok(Self {
            corrections: vectors(&diagnostics.corrections)?,
            ref_mu: to_vec(diagnostics.ref_mu)?,
            ref_sigma: to_vec(diagnostics.ref_sigma)?,
            output: nested_from_tensor(diagnostics.output)?,
            kl_values: diagnostics.kl_values,
            kl_ema: diagnostics.kl_ema,
            variance_ema: diagnostics.variance_ema,
            correction_count: diagnostics.correction_count,
            reference_adapting: diagnostics.reference_adapting,
        })
    }
}

#[pymethods]
impl PyDiagnostics {
    /// JSON document with everything except the output
    fn to_json(&self) -> PyResult<String> {
        let summary = DiagnosticsSummary {
            output_shape: [
                self.output.len(),
                self.output.first().map_or(0, Vec::len),
                self.output
                    .first()
                    .and_then(|rows| rows.first())
                    .map_or(0, Vec::len),
            ],
            kl_values: self.kl_values.clone(),
            corrections: self.corrections.clone(),
            kl_ema: self.kl_ema,
            variance_ema: self.variance_ema,
            ref_mu: self.ref_mu.clone(),
            ref_sigma: self.ref_sigma.clone(),
            correction_count: self.correction_count,
            reference_adapting: self.reference_adapting,
        };
        serde_json::to_string(&summary).with_context("Failed to serialize diagnostics")
    }

    fn __repr__(&self) -> String {
        format!(
            "Diagnostics(kl_values={:?}, correction_count={}, kl_ema={:.6}, \
             variance_ema={:.6}, reference_adapting={})",
            self.kl_values,
            self.correction_count,
            self.kl_ema,
            self.variance_ema,
            self.reference_adapting
        )
    }
}
