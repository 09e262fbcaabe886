use crate::constants::{INITIAL_KL_EMA, INITIAL_VARIANCE_EMA};

/// Exponential moving averages of divergence and feature spread
#[derive(Debug, Clone, PartialEq)]
pub struct EmaTracker {
    /// Weight kept from the previous value
    decay: f64,

    kl_ema: f64,
    variance_ema: f64,
}

impl EmaTracker {
    pub fn new(decay: f64) -> Self {
        Self {
            decay,
            kl_ema: INITIAL_KL_EMA,
            variance_ema: INITIAL_VARIANCE_EMA,
        }
    }

    /// Fold a divergence observation into `kl_ema` and return the new value
    pub fn observe_kl(&mut self, kl: f64) -> f64 {
        self.kl_ema = self.blend(self.kl_ema, kl);
        self.kl_ema
    }

    /// Fold a mean per-token std into `variance_ema` and return the new value
    pub fn observe_spread(&mut self, mean_std: f64) -> f64 {
        self.variance_ema = self.blend(self.variance_ema, mean_std);
        self.variance_ema
    }

    /// Acceptance threshold widened by the current spread: `base · (1 + variance_ema)`
    pub fn adaptive_threshold(&self, base: f64) -> f64 {
        base * (1.0 + self.variance_ema)
    }

    /// Restore the initial values
    pub fn reset(&mut self) {
        self.kl_ema = INITIAL_KL_EMA;
        self.variance_ema = INITIAL_VARIANCE_EMA;
    }

    pub fn kl_ema(&self) -> f64 {
        self.kl_ema
    }

    pub fn variance_ema(&self) -> f64 {
        self.variance_ema
    }

    fn blend(&self, old: f64, new: f64) -> f64 {
        self.decay * old + (1.0 - self.decay) * new
    }
}
