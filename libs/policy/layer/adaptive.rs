use std::fmt;

use burn::tensor::Tensor;
use tracing::{debug, info, instrument, warn};

use super::config::{ConfigWarning, LayerConfig};
use super::diagnostics::{Diagnostics, ForwardOutput};
use super::error::LayerError;
use crate::correction::{
    CorrectionContext, CorrectionHistory, CorrectionStep, RollbackOutcome, compress, try_correct,
};
use crate::divergence::{
    Adaptivity, DivergenceEstimator, ReferenceCache, ReferenceDistribution, ReferenceStats,
};
use crate::ewma::{AdaptivityControl, EmaTracker};
use crate::normalize::Normalizer;
use crate::projection::Projector;
use crate::{Backend, Device};

/// Whether forward calls may mutate running state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// EMAs, hysteresis and corrections are active
    #[default]
    Train,

    /// Divergence is reported only; reference statistics are cached
    Eval,
}

/// Adaptive bias reflective layer
///
/// Owns its parameters and running state. Every forward call projects the input
/// at each configured scale, estimates the divergence from the reference, and in
/// training mode attempts validated corrections before normalizing.
#[derive(Debug, Clone)]
pub struct AdaptiveBiasLayer {
    config: LayerConfig,
    mode: Mode,

    projector: Projector,
    estimator: DivergenceEstimator,
    reference: ReferenceDistribution,
    cache: ReferenceCache,

    tracker: EmaTracker,
    control: AdaptivityControl,

    normalizer: Normalizer,

    /// Ledger of the most recent call's accepted corrections
    history: CorrectionHistory,

    warnings: Vec<ConfigWarning>,
}

impl AdaptiveBiasLayer {
    /// Validate the configuration and initialize parameters
    ///
    /// Out-of-range but usable settings are logged and kept in
    /// [`AdaptiveBiasLayer::config_warnings`].
    #[instrument(level = "info", name = "adaptive_layer_new", skip(device))]
    pub fn new(config: LayerConfig, device: &Device) -> Result<Self, LayerError> {
        let warnings = config.validate()?;
        for warning in &warnings {
            warn!("{}", warning);
        }

        let projector = Projector::init(&config, device)?;
        let layer = Self {
            mode: Mode::default(),
            projector,
            estimator: DivergenceEstimator::new(config.eps),
            reference: ReferenceDistribution::standard(
                config.ref_dim,
                config.trainable_reference,
                device,
            ),
            cache: ReferenceCache::new(),
            tracker: EmaTracker::new(config.ema_decay),
            control: AdaptivityControl::new(config.kl_threshold),
            normalizer: Normalizer::new(config.hidden_dim, config.eps, device),
            history: CorrectionHistory::new(config.hidden_dim, device),
            warnings,
            config,
        };

        info!(
            hidden_dim = layer.config.hidden_dim,
            ref_dim = layer.config.ref_dim,
            num_scales = layer.config.num_scales(),
            monitor_only = layer.config.monitor_only,
            "Adaptive bias layer initialized"
        );
        Ok(layer)
    }

    /// Run one forward call on `[batch, seq, hidden_dim]`
    ///
    /// With `return_dict` the result carries a [`Diagnostics`] record, otherwise
    /// only the normalized tensor.
    pub fn forward(
        &mut self,
        x: Tensor<Backend, 3>,
        return_dict: bool,
    ) -> Result<ForwardOutput, LayerError> {
        let [batch, seq, hidden] = x.dims();
        if hidden != self.config.hidden_dim {
            return Err(LayerError::InputShape {
                expected: self.config.hidden_dim,
                actual: hidden,
            });
        }

        // No tokens: nothing to estimate, correct or normalize
        if batch * seq == 0 {
            debug!(batch, seq, "empty input, running state left unchanged");
            self.history.clear();
            return Ok(self.emit(x, Vec::new(), return_dict));
        }

        let training = self.mode == Mode::Train;
        let correcting = training && !self.config.monitor_only;
        let threshold = self.tracker.adaptive_threshold(self.config.kl_threshold);
        let stats = self.reference_stats(batch);
        let step = CorrectionStep::from_config(&self.config);

        let scales = self.config.scales.clone();
        let mut kl_values = Vec::with_capacity(scales.len());
        let mut accepted = Vec::new();
        let mut x_corr = x;

        for (scale_idx, scale) in scales.into_iter().enumerate() {
            let projection = self.projector.project(x_corr.clone(), scale_idx, scale);
            let kl = self.estimator.kl(projection.projected.clone(), &stats);
            kl_values.push(kl);
            debug!(scale_idx, scale, kl, threshold, "divergence estimated");

            if training {
                let kl_ema = self.tracker.observe_kl(kl);
                self.update_adaptivity(kl_ema);
            }

            if !correcting || accepted.len() >= self.config.max_corrections {
                continue;
            }
            if !(kl > threshold) {
                continue;
            }

            let ctx = CorrectionContext {
                projector: &self.projector,
                estimator: &self.estimator,
                reference: &stats,
                step,
            };
            if let Some(correction) = try_correct(&ctx, &x_corr, &projection, scale_idx, scale, kl)
            {
                accepted.push(compress(
                    correction.correction,
                    self.config.compression_factor,
                ));
                x_corr = correction.corrected;
            }
        }

        self.history.replace(accepted);

        let normalized = self.normalizer.forward(x_corr);
        if training {
            self.tracker.observe_spread(normalized.mean_std);
        }

        Ok(self.emit(normalized.output, kl_values, return_dict))
    }

    /// Forward call returning only the normalized tensor
    pub fn forward_tensor(
        &mut self,
        x: Tensor<Backend, 3>,
    ) -> Result<Tensor<Backend, 3>, LayerError> {
        Ok(self.forward(x, false)?.into_output())
    }

    /// Delta that undoes the most recent call's corrections, `[hidden_dim]`
    ///
    /// `-1` undoes all of them, `k >= 0` only the k-th. Missing history and
    /// out-of-range steps yield a zero vector.
    pub fn rollback(&self, step: i64) -> Tensor<Backend, 1> {
        self.rollback_checked(step).into_delta()
    }

    /// Like [`AdaptiveBiasLayer::rollback`], reporting why nothing was undone
    pub fn rollback_checked(&self, step: i64) -> RollbackOutcome {
        self.history.rollback(step.into())
    }

    /// Sparsity penalty on the gating logits for the host's loss
    pub fn sparsity_loss(&self) -> f64 {
        self.projector.sparsity_loss()
    }

    /// Stop the reference from adapting
    pub fn freeze_reference(&mut self) {
        self.reference.set_adaptivity(Adaptivity::Frozen);
        info!("Reference distribution frozen");
    }

    /// Restore the EMAs to their initial values and drop cached state
    pub fn reset_stats(&mut self) {
        self.tracker.reset();
        self.cache.invalidate();
        self.history.clear();
        info!(
            kl_ema = self.tracker.kl_ema(),
            variance_ema = self.tracker.variance_ema(),
            "Running statistics reset"
        );
    }

    pub fn train(&mut self) {
        self.mode = Mode::Train;
    }

    pub fn eval(&mut self) {
        self.mode = Mode::Eval;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn kl_ema(&self) -> f64 {
        self.tracker.kl_ema()
    }

    pub fn variance_ema(&self) -> f64 {
        self.tracker.variance_ema()
    }

    pub fn reference_trainable(&self) -> bool {
        self.reference.adaptivity().is_adapting()
    }

    /// Mark the reference mean and spread trainable independently
    ///
    /// Hysteresis follows the mean's flag and overwrites both on its next toggle.
    pub fn set_reference_trainable(&mut self, mu: bool, sigma: bool) {
        self.reference.set_mu_trainable(mu);
        self.reference.set_sigma_trainable(sigma);
    }

    /// Sum of the most recent call's quantized corrections
    pub fn correction_buffer(&self) -> &Tensor<Backend, 1> {
        self.history.buffer()
    }

    pub fn compressed_history(&self) -> &[Tensor<Backend, 1>] {
        self.history.entries()
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn config_warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    pub fn reference(&self) -> &ReferenceDistribution {
        &self.reference
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    /// Replace the reference mean and spread
    pub fn set_reference(
        &mut self,
        mu: Tensor<Backend, 1>,
        sigma: Tensor<Backend, 1>,
    ) -> Result<(), LayerError> {
        self.reference.update(mu, sigma)?;
        self.cache.invalidate();
        Ok(())
    }

    /// Replace the projection matrix `[ref_dim, hidden_dim]` and bias `[ref_dim]`
    pub fn set_projection(
        &mut self,
        weight: Tensor<Backend, 2>,
        bias: Tensor<Backend, 1>,
    ) -> Result<(), LayerError> {
        self.projector.set_projection(weight, bias)
    }

    /// Replace the gating logits, one `[ref_dim]` row per scale
    pub fn set_gates(&mut self, gates: Vec<Tensor<Backend, 1>>) -> Result<(), LayerError> {
        self.projector.set_gates(gates)
    }

    pub fn set_affine(
        &mut self,
        gamma: Tensor<Backend, 1>,
        beta: Tensor<Backend, 1>,
    ) -> Result<(), LayerError> {
        self.normalizer.set_affine(gamma, beta)
    }

    /// One-line configuration summary for logging
    pub fn summary(&self) -> String {
        let config = &self.config;
        let clip = match config.gradient_clip_value {
            Some(clip) => clip.to_string(),
            None => "None".to_string(),
        };
        format!(
            "hidden_dim={}, ref_dim={}, alpha={}, eps={}, kl_threshold={}, \
             trainable_reference={}, monitor_only={}, gradient_clip={}",
            config.hidden_dim,
            config.ref_dim,
            config.alpha,
            config.eps,
            config.kl_threshold,
            self.reference_trainable(),
            config.monitor_only,
            clip
        )
    }

    fn emit(
        &self,
        output: Tensor<Backend, 3>,
        kl_values: Vec<f64>,
        return_dict: bool,
    ) -> ForwardOutput {
        if !return_dict {
            return ForwardOutput::Tensor(output);
        }

        ForwardOutput::Diagnostics(Box::new(Diagnostics {
            output,
            kl_values,
            corrections: self.history.entries().to_vec(),
            kl_ema: self.tracker.kl_ema(),
            variance_ema: self.tracker.variance_ema(),
            ref_mu: self.reference.mu().clone(),
            ref_sigma: self.reference.sigma().clone(),
            correction_count: self.history.len(),
            reference_adapting: self.reference.adaptivity().is_adapting(),
        }))
    }

    /// Cached in evaluation mode; rebuilt every call while training
    fn reference_stats(&mut self, batch_size: usize) -> ReferenceStats {
        match self.mode {
            Mode::Eval => self.cache.get_or_refresh(&self.reference, batch_size),
            Mode::Train => self.reference.stats(),
        }
    }

    fn update_adaptivity(&mut self, kl_ema: f64) {
        if let Some(next) = self.control.next(self.reference.adaptivity(), kl_ema) {
            self.reference.set_adaptivity(next);
            debug!(?next, kl_ema, "reference adaptivity changed");
        }
    }
}

impl fmt::Display for AdaptiveBiasLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdaptiveBiasLayer({})", self.summary())
    }
}
