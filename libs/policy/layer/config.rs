//! Configuration for the adaptive bias reflective layer
//!
//! All settings are fixed at construction. Validation separates fatal problems
//! (returned as [`ConfigError`]) from values that are merely outside their
//! recommended range (returned as [`ConfigWarning`] and logged).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::constants::{
    DEFAULT_ALPHA, DEFAULT_COMPRESSION_FACTOR, DEFAULT_EMA_DECAY, DEFAULT_EPS,
    DEFAULT_HIDDEN_DIM, DEFAULT_KL_THRESHOLD, DEFAULT_MAX_CORRECTIONS, DEFAULT_REF_DIM,
    DEFAULT_SCALES,
};

/// Configuration for [`AdaptiveBiasLayer`](super::AdaptiveBiasLayer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Feature dimension H of the input
    pub hidden_dim: usize,

    /// Dimension R of the reference space
    pub ref_dim: usize,

    /// Correction step size, recommended in (0, 1)
    pub alpha: f64,

    /// Numerical floor used by the estimator and the normalizer
    pub eps: f64,

    /// Base divergence threshold for corrections and hysteresis
    pub kl_threshold: f64,

    /// Decay of the divergence and spread EMAs
    pub ema_decay: f64,

    /// Scale factors, processed in order
    pub scales: Vec<f64>,

    /// Maximum accepted corrections per forward call
    pub max_corrections: usize,

    /// Quantization grid for stored corrections (1 / compression_factor)
    pub compression_factor: f64,

    /// Whether the reference distribution starts out adapting
    pub trainable_reference: bool,

    /// Estimate and track divergence but never correct
    pub monitor_only: bool,

    /// Elementwise clamp applied to corrections in training mode
    pub gradient_clip_value: Option<f64>,

    /// Seed for parameter initialization; random when unset
    pub seed: Option<u64>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            hidden_dim: DEFAULT_HIDDEN_DIM,
            ref_dim: DEFAULT_REF_DIM,
            alpha: DEFAULT_ALPHA,
            eps: DEFAULT_EPS,
            kl_threshold: DEFAULT_KL_THRESHOLD,
            ema_decay: DEFAULT_EMA_DECAY,
            scales: DEFAULT_SCALES.to_vec(),
            max_corrections: DEFAULT_MAX_CORRECTIONS,
            compression_factor: DEFAULT_COMPRESSION_FACTOR,
            trainable_reference: false,
            monitor_only: false,
            gradient_clip_value: None,
            seed: None,
        }
    }
}

impl LayerConfig {
    /// Create a configuration with default hyperparameters for the given feature dimension
    pub fn new(hidden_dim: usize) -> Self {
        Self {
            hidden_dim,
            ..Self::default()
        }
    }

    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn with_ref_dim(mut self, ref_dim: usize) -> Self {
        self.ref_dim = ref_dim;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_kl_threshold(mut self, kl_threshold: f64) -> Self {
        self.kl_threshold = kl_threshold;
        self
    }

    pub fn with_ema_decay(mut self, ema_decay: f64) -> Self {
        self.ema_decay = ema_decay;
        self
    }

    pub fn with_scales(mut self, scales: Vec<f64>) -> Self {
        self.scales = scales;
        self
    }

    pub fn with_max_corrections(mut self, max_corrections: usize) -> Self {
        self.max_corrections = max_corrections;
        self
    }

    pub fn with_compression_factor(mut self, compression_factor: f64) -> Self {
        self.compression_factor = compression_factor;
        self
    }

    pub fn with_trainable_reference(mut self, trainable_reference: bool) -> Self {
        self.trainable_reference = trainable_reference;
        self
    }

    pub fn with_monitor_only(mut self, monitor_only: bool) -> Self {
        self.monitor_only = monitor_only;
        self
    }

    pub fn with_gradient_clip(mut self, clip: Option<f64>) -> Self {
        self.gradient_clip_value = clip;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Number of configured scales (rows of the gating matrix)
    pub fn num_scales(&self) -> usize {
        self.scales.len()
    }

    /// Validate configuration parameters
    ///
    /// Returns the non-fatal warnings on success.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        if self.hidden_dim == 0 {
            return Err(ConfigError::InvalidDimension {
                name: "hidden_dim",
                value: self.hidden_dim,
            });
        }

        if self.ref_dim == 0 {
            return Err(ConfigError::InvalidDimension {
                name: "ref_dim",
                value: self.ref_dim,
            });
        }

        // Written so that NaN is rejected as well
        if !(self.eps > 0.0) {
            return Err(ConfigError::InvalidEps(self.eps));
        }

        if self.compression_factor == 0.0 || !self.compression_factor.is_finite() {
            return Err(ConfigError::InvalidCompressionFactor(self.compression_factor));
        }

        let mut warnings = Vec::new();

        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            warnings.push(ConfigWarning::AlphaOutOfRange(self.alpha));
        }

        if !(0.0..=1.0).contains(&self.ema_decay) {
            warnings.push(ConfigWarning::EmaDecayOutOfRange(self.ema_decay));
        }

        if self.scales.is_empty() {
            warnings.push(ConfigWarning::EmptyScales);
        }

        for (index, &value) in self.scales.iter().enumerate() {
            if !(value > 0.0) {
                warnings.push(ConfigWarning::NonPositiveScale { index, value });
            }
        }

        if let Some(clip) = self.gradient_clip_value
            && !(clip > 0.0)
        {
            warnings.push(ConfigWarning::NonPositiveClip(clip));
        }

        Ok(warnings)
    }
}

/// Non-fatal configuration findings
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// `alpha` outside the recommended open interval (0, 1)
    AlphaOutOfRange(f64),

    /// `ema_decay` outside [0, 1]
    EmaDecayOutOfRange(f64),

    /// No scales configured, the layer only normalizes
    EmptyScales,

    NonPositiveScale { index: usize, value: f64 },

    /// Clip value that is not positive; clipping is disabled
    NonPositiveClip(f64),
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::AlphaOutOfRange(alpha) => {
                write!(f, "Alpha value {} is outside recommended range (0, 1)", alpha)
            }
            ConfigWarning::EmaDecayOutOfRange(decay) => {
                write!(f, "EMA decay {} is outside [0, 1]", decay)
            }
            ConfigWarning::EmptyScales => {
                write!(f, "No scales configured, corrections are disabled")
            }
            ConfigWarning::NonPositiveScale { index, value } => {
                write!(f, "Scale {} at index {} is not positive", value, index)
            }
            ConfigWarning::NonPositiveClip(clip) => {
                write!(f, "Gradient clip value {} is not positive, clipping disabled", clip)
            }
        }
    }
}
