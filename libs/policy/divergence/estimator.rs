use burn::tensor::Tensor;

use super::reference::ReferenceStats;
use crate::{Backend, scalar};

/// Closed-form Gaussian KL estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergenceEstimator {
    /// Floor for the batch std and additive term inside the log
    eps: f64,
}

impl DivergenceEstimator {
    pub fn new(eps: f64) -> Self {
        Self { eps }
    }

    /// Mean and floored population std over the batch and sequence axes
    ///
    /// Input: projected `[batch, seq, ref_dim]`
    /// Output: `([1, ref_dim], [1, ref_dim])`
    pub fn batch_moments(
        &self,
        projected: Tensor<Backend, 3>,
    ) -> (Tensor<Backend, 2>, Tensor<Backend, 2>) {
        let [batch, seq, ref_dim] = projected.dims();
        let flat = projected.reshape([batch * seq, ref_dim]);

        let mu = flat.clone().mean_dim(0);
        let centered = flat - mu.clone();
        let variance = (centered.clone() * centered).mean_dim(0);
        let sigma = variance.sqrt().clamp_min(self.eps);

        (mu, sigma)
    }

    /// Per-dimension KL divergence, `[1, ref_dim]`
    pub fn kl_per_dim(
        &self,
        projected: Tensor<Backend, 3>,
        reference: &ReferenceStats,
    ) -> Tensor<Backend, 2> {
        let (mu, sigma) = self.batch_moments(projected);

        let log_ratio = (sigma.clone() / reference.sigma.clone())
            .add_scalar(self.eps)
            .log();
        let offset = reference.mu.clone() - mu;
        let numerator = reference.sigma_sq.clone() + offset.clone() * offset;
        let denominator = (sigma.clone() * sigma).mul_scalar(2.0);

        (log_ratio + numerator / denominator).sub_scalar(0.5)
    }

    /// Divergence of the projected batch from the reference, averaged over dimensions
    pub fn kl(&self, projected: Tensor<Backend, 3>, reference: &ReferenceStats) -> f64 {
        scalar(self.kl_per_dim(projected, reference).mean())
    }
}
