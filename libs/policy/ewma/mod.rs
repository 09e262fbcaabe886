//! EMA tracking and reference-adaptivity hysteresis
//!
//! Two exponential moving averages persist across forward calls (training mode only):
//!
//! ```text
//! kl_ema       ← decay·kl_ema       + (1 − decay)·kl          (per evaluated scale)
//! variance_ema ← decay·variance_ema + (1 − decay)·mean(std)   (per call, in the normalizer)
//! ```
//!
//! `variance_ema` widens the acceptance threshold, `kl_threshold · (1 + variance_ema)`.
//! `kl_ema` drives the hysteresis that lets the reference adapt:
//!
//! - Frozen → Adapting when `kl_ema > 2 · kl_threshold`
//! - Adapting → Frozen when `kl_ema ≤ kl_threshold`
//! - no change in the dead zone `(kl_threshold, 2 · kl_threshold]`

pub mod hysteresis;
pub mod tracker;

pub use hysteresis::AdaptivityControl;
pub use tracker::EmaTracker;
