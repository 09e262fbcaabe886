use crate::constants::UNFREEZE_FACTOR;
use crate::divergence::Adaptivity;

/// Double-threshold rule deciding whether the reference may adapt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptivityControl {
    /// Freeze at or below this value
    freeze_below: f64,

    /// Unfreeze strictly above this value
    unfreeze_above: f64,
}

impl AdaptivityControl {
    /// Build the rule for a base divergence threshold
    pub fn new(kl_threshold: f64) -> Self {
        Self {
            freeze_below: kl_threshold,
            unfreeze_above: UNFREEZE_FACTOR * kl_threshold,
        }
    }

    /// Next adaptivity state, or `None` when `kl_ema` leaves it unchanged
    pub fn next(&self, current: Adaptivity, kl_ema: f64) -> Option<Adaptivity> {
        match current {
            Adaptivity::Frozen if kl_ema > self.unfreeze_above => Some(Adaptivity::Adapting),
            Adaptivity::Adapting if kl_ema <= self.freeze_below => Some(Adaptivity::Frozen),
            _ => None,
        }
    }

    /// True when `kl_ema` lies in `(kl_threshold, 2 · kl_threshold]`
    pub fn in_dead_zone(&self, kl_ema: f64) -> bool {
        kl_ema > self.freeze_below && kl_ema <= self.unfreeze_above
    }
}
