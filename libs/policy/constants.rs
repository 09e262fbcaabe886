// Layer defaults
pub const DEFAULT_HIDDEN_DIM: usize = 768;
pub const DEFAULT_REF_DIM: usize = 64;
pub const DEFAULT_ALPHA: f64 = 0.01;
pub const DEFAULT_EPS: f64 = 1e-6;
pub const DEFAULT_KL_THRESHOLD: f64 = 0.1;
pub const DEFAULT_EMA_DECAY: f64 = 0.95;
pub const DEFAULT_SCALES: [f64; 3] = [1.0, 0.5, 0.1];
pub const DEFAULT_MAX_CORRECTIONS: usize = 3;
pub const DEFAULT_COMPRESSION_FACTOR: f64 = 4.0;

// Correction step
/// Lower bound of the deviation magnitude used to scale `alpha`
pub const ADAPTIVE_STEP_MIN: f64 = 0.05;
/// Upper bound of the deviation magnitude used to scale `alpha`
pub const ADAPTIVE_STEP_MAX: f64 = 10.0;

// Tracking
pub const INITIAL_KL_EMA: f64 = 0.0;
pub const INITIAL_VARIANCE_EMA: f64 = 1.0;

/// The reference starts adapting once `kl_ema > UNFREEZE_FACTOR * kl_threshold`
pub const UNFREEZE_FACTOR: f64 = 2.0;

// Parameters
/// Coefficient applied to the mean absolute gating logit
pub const SPARSITY_COEFFICIENT: f64 = 0.01;
/// Initial gating logit, sigmoid(1.0) ≈ 0.73
pub const GATE_INIT_LOGIT: f32 = 1.0;

/// The normalizer floors the per-token std at `STD_FLOOR_FACTOR * eps`
pub const STD_FLOOR_FACTOR: f64 = 10.0;
