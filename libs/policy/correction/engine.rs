use burn::tensor::Tensor;
use tracing::debug;

use crate::constants::{ADAPTIVE_STEP_MAX, ADAPTIVE_STEP_MIN};
use crate::divergence::{DivergenceEstimator, ReferenceStats};
use crate::layer::LayerConfig;
use crate::projection::{Projection, Projector};
use crate::{Backend, scalar};

/// Step-size settings for correction attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionStep {
    pub alpha: f64,

    /// Elementwise bound on the correction; ignored unless positive
    pub clip: Option<f64>,
}

impl CorrectionStep {
    pub fn from_config(config: &LayerConfig) -> Self {
        Self {
            alpha: config.alpha,
            clip: config.gradient_clip_value.filter(|clip| *clip > 0.0),
        }
    }
}

/// Read-only view of everything a correction attempt needs
#[derive(Debug, Clone, Copy)]
pub struct CorrectionContext<'a> {
    pub projector: &'a Projector,
    pub estimator: &'a DivergenceEstimator,
    pub reference: &'a ReferenceStats,
    pub step: CorrectionStep,
}

/// A correction that strictly reduced divergence at its scale
#[derive(Debug, Clone)]
pub struct AcceptedCorrection {
    /// Input with the exact (unquantized) correction applied
    pub corrected: Tensor<Backend, 3>,

    /// Exact correction vector: [hidden_dim]
    pub correction: Tensor<Backend, 1>,

    pub kl_before: f64,
    pub kl_after: f64,
}

impl<'a> CorrectionContext<'a> {
    /// Candidate correction in input space for an already projected batch
    pub fn candidate(&self, projection: &Projection, scale: f64) -> Tensor<Backend, 1> {
        let [batch, seq, ref_dim] = projection.projected.dims();
        let [_, hidden_dim] = projection.weighted.dims();

        let mu = projection
            .projected
            .clone()
            .reshape([batch * seq, ref_dim])
            .mean_dim(0);
        let delta = self.reference.mu.clone() - mu;

        let magnitude =
            scalar(delta.clone().abs().mean()).clamp(ADAPTIVE_STEP_MIN, ADAPTIVE_STEP_MAX);
        let step = self.step.alpha * magnitude;

        // [1, ref_dim] x [ref_dim, hidden_dim]
        let correction = delta
            .matmul(projection.weighted.clone())
            .mul_scalar(step * scale)
            .reshape([hidden_dim]);

        match self.step.clip {
            Some(clip) => correction.clamp(-clip, clip),
            None => correction,
        }
    }
}

/// Attempt one correction at a scale without mutating any state
///
/// `projection` and `kl_before` must come from projecting `x` at `scale_idx`.
/// Returns `None` when the tentative correction does not strictly lower the
/// divergence, in which case `x` stays as it was.
pub fn try_correct(
    ctx: &CorrectionContext<'_>,
    x: &Tensor<Backend, 3>,
    projection: &Projection,
    scale_idx: usize,
    scale: f64,
    kl_before: f64,
) -> Option<AcceptedCorrection> {
    let correction = ctx.candidate(projection, scale);
    let hidden_dim = correction.dims()[0];

    let tentative = x.clone() + correction.clone().reshape([1, 1, hidden_dim]);
    let reprojected = ctx.projector.project(tentative.clone(), scale_idx, scale);
    let kl_after = ctx.estimator.kl(reprojected.projected, ctx.reference);

    // NaN compares false and is rejected
    if kl_after < kl_before {
        debug!(scale_idx, scale, kl_before, kl_after, "correction accepted");
        Some(AcceptedCorrection {
            corrected: tentative,
            correction,
            kl_before,
            kl_after,
        })
    } else {
        debug!(scale_idx, scale, kl_before, kl_after, "correction rejected");
        None
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::TensorData;

    use super::*;
    use crate::divergence::ReferenceDistribution;
    use crate::{Device, to_vec};

    /// [I_2 | 0] over hidden_dim = 4 with a nearly open gate
    fn projector() -> Projector {
        let device = Device::default();
        let weight = Tensor::from_data(
            TensorData::new(vec![1.0f32, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0], [2, 4]),
            &device,
        );
        Projector::new(
            weight,
            Tensor::zeros([2], &device),
            vec![Tensor::full([2], 8.0, &device)],
        )
        .unwrap()
    }

    /// Both projected dimensions alternate 2 / 4: mean 3, std 1
    fn shifted_batch() -> Tensor<Backend, 3> {
        let values = vec![
            2.0f32, 2.0, 0.1, 0.2, //
            4.0, 4.0, 0.3, 0.4, //
            2.0, 2.0, 0.5, 0.6, //
            4.0, 4.0, 0.7, 0.8,
        ];
        Tensor::from_data(TensorData::new(values, [2, 2, 4]), &Device::default())
    }

    fn attempt(step: CorrectionStep) -> (f64, Option<AcceptedCorrection>) {
        let projector = projector();
        let estimator = DivergenceEstimator::new(1e-6);
        let reference = ReferenceDistribution::standard(2, false, &Device::default()).stats();
        let ctx = CorrectionContext {
            projector: &projector,
            estimator: &estimator,
            reference: &reference,
            step,
        };

        let x = shifted_batch();
        let projection = projector.project(x.clone(), 0, 1.0);
        let kl_before = estimator.kl(projection.projected.clone(), &reference);
        (kl_before, try_correct(&ctx, &x, &projection, 0, 1.0, kl_before))
    }

    #[test]
    fn test_small_step_is_accepted_and_reduces_divergence() {
        let (kl_before, accepted) = attempt(CorrectionStep {
            alpha: 0.1,
            clip: None,
        });
        let accepted = accepted.expect("correction toward the reference should be accepted");

        assert!(accepted.kl_after < kl_before);
        assert_eq!(accepted.kl_before, kl_before);

        // Correction pulls the projected features down, leaves the rest alone
        let correction = to_vec(accepted.correction).unwrap();
        assert!(correction[0] < 0.0 && correction[1] < 0.0);
        assert_eq!(correction[2], 0.0);
        assert_eq!(correction[3], 0.0);
    }

    #[test]
    fn test_overshooting_step_is_rejected() {
        // step = 0.9 * 3 ≈ 2.7 moves the mean from +3 to about -5
        let (_, accepted) = attempt(CorrectionStep {
            alpha: 0.9,
            clip: None,
        });
        assert!(accepted.is_none());
    }

    #[test]
    fn test_clip_bounds_every_component() {
        let (_, accepted) = attempt(CorrectionStep {
            alpha: 0.1,
            clip: Some(0.05),
        });
        let accepted = accepted.expect("clipped correction still points toward the reference");
        for value in to_vec(accepted.correction).unwrap() {
            assert!(value.abs() <= 0.05 + 1e-7);
        }
    }

    #[test]
    fn test_step_from_config_drops_non_positive_clip() {
        let config = LayerConfig::new(4).with_gradient_clip(Some(-1.0));
        assert_eq!(CorrectionStep::from_config(&config).clip, None);

        let config = LayerConfig::new(4).with_gradient_clip(Some(0.5));
        assert_eq!(CorrectionStep::from_config(&config).clip, Some(0.5));
    }
}
