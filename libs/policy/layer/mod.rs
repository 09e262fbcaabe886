//! Adaptive bias reflective layer
//!
//! One forward call runs the following state machine:
//!
//! ```text
//! START
//!   for each scale, in configured order:
//!     PROJECT -> ESTIMATE_KL -> [training: update kl_ema, hysteresis]
//!             -> [training, correcting, under budget, kl > threshold: CORRECT_AND_VALIDATE]
//! AGGREGATE_HISTORY -> NORMALIZE -> EMIT | EMIT_DIAGNOSTICS
//! ```
//!
//! The acceptance threshold `kl_threshold · (1 + variance_ema)` is fixed at the
//! start of the call. Scale `i + 1` sees the input as corrected by scales `0..=i`.
//!
//! The layer mutates its EMAs, history and reference cache in place and is meant
//! to be driven from one thread at a time.

pub mod adaptive;
pub mod config;
pub mod diagnostics;
pub mod error;

pub use adaptive::{AdaptiveBiasLayer, Mode};
pub use config::{ConfigWarning, LayerConfig};
pub use diagnostics::{Diagnostics, DiagnosticsSummary, ForwardOutput};
pub use error::{ConfigError, LayerError};
