//! Projection into the reference space
//!
//! A single learnable `R × H` matrix is shared by all scales. Each scale owns a
//! gating row of `R` logits; the sigmoid of that row re-weights the matrix row-wise
//! before the affine map `weighted · (x · scale) + bias` is applied.

pub mod projector;

pub use projector::{Projection, Projector};
