//! Validated corrections, quantized history and rollback
//!
//! A correction for one scale is computed from the deviation of the projected
//! batch mean from the reference mean, mapped back to input space through the
//! transpose of the weighted projection:
//!
//! ```text
//! δ          = μ_ref − μ_batch                          (in reference space)
//! step       = alpha · clamp(mean|δ|, 0.05, 10.0)
//! correction = step · scale · Wᵀ δ                      (in input space)
//! ```
//!
//! The correction is applied tentatively and kept only if the divergence at the
//! same scale strictly decreases. The input receives the exact correction; the
//! history stores it quantized to a `1 / compression_factor` grid.

pub mod engine;
pub mod history;

pub use engine::{AcceptedCorrection, CorrectionContext, CorrectionStep, try_correct};
pub use history::{CorrectionHistory, RollbackOutcome, RollbackStep, compress};
