//! Feature-wise normalization with learnable affine parameters
//!
//! ```text
//! out = (x − mean) / (max(std, 10·eps) + eps) · gamma + beta
//! ```
//!
//! Mean and std are taken per token along the feature axis, std with Bessel's
//! correction. The unclamped mean std is reported back for the spread EMA.

pub mod normalizer;

pub use normalizer::{Normalized, Normalizer};
