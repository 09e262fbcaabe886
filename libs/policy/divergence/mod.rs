//! Divergence estimation against the reference distribution
//!
//! Both the projected batch and the reference are treated as independent
//! per-dimension Gaussians. For each reference dimension:
//!
//! ```text
//! KL_d = log(σ_d / σ_ref,d + eps) + (σ_ref,d² + (μ_ref,d − μ_d)²) / (2 σ_d²) − 1/2
//! ```
//!
//! where μ_d, σ_d are reduced jointly over the batch and sequence axes (population
//! std, floored at `eps`). The estimate is the mean of KL_d over dimensions.
//!
//! The reference carries a version counter that is bumped on every parameter
//! update; [`ReferenceCache`] keys its entry on that version and on the batch size.

pub mod estimator;
pub mod reference;

pub use estimator::DivergenceEstimator;
pub use reference::{Adaptivity, ReferenceCache, ReferenceDistribution, ReferenceStats};
