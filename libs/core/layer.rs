//! Thin Python interface to the adaptive bias layer
//!
//! Every decision is delegated to [`policy::AdaptiveBiasLayer`]; this module only
//! converts nested lists to tensors and back.

use policy::constants::{
    DEFAULT_ALPHA, DEFAULT_COMPRESSION_FACTOR, DEFAULT_EMA_DECAY, DEFAULT_EPS,
    DEFAULT_KL_THRESHOLD, DEFAULT_MAX_CORRECTIONS, DEFAULT_REF_DIM, DEFAULT_SCALES,
};
use policy::{AdaptiveBiasLayer, Device, ForwardOutput, LayerConfig, Mode, to_vec};
use pyo3::prelude::*;
use tracing::{debug, instrument};

use crate::types::conversions::{
    ConversionResult, layer_err, nested_from_tensor, tensor_from_nested, vectors,
};
use crate::types::diagnostics::PyDiagnostics;

/// Either the normalized output or the full diagnostics record
#[derive(IntoPyObject)]
pub enum PyForwardOutput {
    Output(Vec<Vec<Vec<f32>>>),
    Diagnostics(PyDiagnostics),
}

/// Adaptive bias reflective layer for a Python host
///
/// The layer mutates its running statistics on every call and is bound to the
/// thread that created it.
#[pyclass(unsendable, name = "AdaptiveBiasLayer")]
pub struct PyAdaptiveLayer {
    inner: AdaptiveBiasLayer,
    device: Device,
}

#[pymethods]
impl PyAdaptiveLayer {
    #[new]
    #[pyo3(signature = (
        hidden_dim,
        ref_dim = DEFAULT_REF_DIM,
        alpha = DEFAULT_ALPHA,
        eps = DEFAULT_EPS,
        kl_threshold = DEFAULT_KL_THRESHOLD,
        ema_decay = DEFAULT_EMA_DECAY,
        scales = None,
        max_corrections = DEFAULT_MAX_CORRECTIONS,
        compression_factor = DEFAULT_COMPRESSION_FACTOR,
        trainable_reference = false,
        monitor_only = false,
        gradient_clip_value = None,
        seed = None
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hidden_dim: usize,
        ref_dim: usize,
        alpha: f64,
        eps: f64,
        kl_threshold: f64,
        ema_decay: f64,
        scales: Option<Vec<f64>>,
        max_corrections: usize,
        compression_factor: f64,
        trainable_reference: bool,
        monitor_only: bool,
        gradient_clip_value: Option<f64>,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let mut config = LayerConfig::new(hidden_dim)
            .with_ref_dim(ref_dim)
            .with_alpha(alpha)
            .with_eps(eps)
            .with_kl_threshold(kl_threshold)
            .with_ema_decay(ema_decay)
            .with_scales(scales.unwrap_or_else(|| DEFAULT_SCALES.to_vec()))
            .with_max_corrections(max_corrections)
            .with_compression_factor(compression_factor)
            .with_trainable_reference(trainable_reference)
            .with_monitor_only(monitor_only)
            .with_gradient_clip(gradient_clip_value);
        config.seed = seed;

        Self::from_config(config)
    }

    /// Build a layer from a JSON configuration document
    #[staticmethod]
    pub fn from_json(json: &str) -> PyResult<Self> {
        let config = LayerConfig::from_json(json).map_err(|e| layer_err(e.into()))?;
        Self::from_config(config)
    }

    /// Run one forward call on nested lists `[batch][seq][hidden_dim]`
    #[pyo3(signature = (x, return_dict = false))]
    pub fn forward(
        &mut self,
        x: Vec<Vec<Vec<f32>>>,
        return_dict: bool,
    ) -> PyResult<PyForwardOutput> {
        let input = tensor_from_nested(&x, &self.device)
            .map_err(pyo3::exceptions::PyValueError::new_err)?;

        match self.inner.forward(input, return_dict).map_err(layer_err)? {
            ForwardOutput::Tensor(output) => Ok(PyForwardOutput::Output(
                nested_from_tensor(output).map_err(layer_err)?,
            )),
            ForwardOutput::Diagnostics(diagnostics) => {
                let diagnostics = PyDiagnostics::try_from(*diagnostics).map_err(layer_err)?;
                debug!(
                    correction_count = diagnostics.correction_count,
                    "forward diagnostics converted"
                );
                Ok(PyForwardOutput::Diagnostics(diagnostics))
            }
        }
    }

    /// Vector to add to the last output to undo its corrections
    #[pyo3(signature = (step = -1))]
    pub fn rollback(&self, step: i64) -> PyResult<Vec<f32>> {
        to_vec(self.inner.rollback(step)).with_context("Failed to read rollback delta")
    }

    pub fn get_sparsity_loss(&self) -> f64 {
        self.inner.sparsity_loss()
    }

    pub fn freeze_reference(&mut self) {
        self.inner.freeze_reference();
    }

    pub fn reset_stats(&mut self) {
        self.inner.reset_stats();
    }

    pub fn train(&mut self) {
        self.inner.train();
    }

    pub fn eval(&mut self) {
        self.inner.eval();
    }

    #[getter]
    pub fn training(&self) -> bool {
        self.inner.mode() == Mode::Train
    }

    #[getter]
    pub fn kl_ema(&self) -> f64 {
        self.inner.kl_ema()
    }

    #[getter]
    pub fn variance_ema(&self) -> f64 {
        self.inner.variance_ema()
    }

    #[getter]
    pub fn reference_trainable(&self) -> bool {
        self.inner.reference_trainable()
    }

    #[getter]
    pub fn correction_buffer(&self) -> PyResult<Vec<f32>> {
        to_vec(self.inner.correction_buffer().clone())
            .with_context("Failed to read correction buffer")
    }

    #[getter]
    pub fn compressed_history(&self) -> PyResult<Vec<Vec<f32>>> {
        vectors(self.inner.compressed_history()).with_context("Failed to read history")
    }

    /// Non-fatal configuration findings, as messages
    #[getter]
    pub fn config_warnings(&self) -> Vec<String> {
        self.inner
            .config_warnings()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub fn summary(&self) -> String {
        self.inner.summary()
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}

impl PyAdaptiveLayer {
    #[instrument(level = "debug", name = "py_adaptive_layer_new")]
    fn from_config(config: LayerConfig) -> PyResult<Self> {
        let device = Device::default();
        let inner = AdaptiveBiasLayer::new(config, &device).map_err(layer_err)?;
        Ok(Self { inner, device })
    }

    /// Borrow the wrapped layer
    pub fn inner(&self) -> &AdaptiveBiasLayer {
        &self.inner
    }
}
