use burn::tensor::Tensor;
use tracing::warn;

use crate::{Backend, Device};

/// Quantize a correction to the `1 / factor` grid: `round(c · factor) / factor`
pub fn compress(correction: Tensor<Backend, 1>, factor: f64) -> Tensor<Backend, 1> {
    correction.mul_scalar(factor).round().div_scalar(factor)
}

/// Which part of the most recent call's corrections to undo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackStep {
    /// Every correction of the call (`step = -1`)
    All,

    /// A single correction by position in the call's history
    Index(usize),

    /// A negative step other than -1
    Invalid(i64),
}

impl From<i64> for RollbackStep {
    fn from(step: i64) -> Self {
        match step {
            -1 => RollbackStep::All,
            s if s >= 0 => RollbackStep::Index(s as usize),
            s => RollbackStep::Invalid(s),
        }
    }
}

/// Result of a rollback request
///
/// Every variant carries a `[hidden_dim]` delta to be added to a previous output;
/// only `Applied` carries a non-zero one.
#[derive(Debug, Clone)]
pub enum RollbackOutcome {
    Applied(Tensor<Backend, 1>),

    /// No correction was accepted in the most recent call
    NoHistory(Tensor<Backend, 1>),

    /// Step outside `[0, len)`; recoverable, the delta is zero
    OutOfRange {
        step: i64,
        len: usize,
        delta: Tensor<Backend, 1>,
    },
}

impl RollbackOutcome {
    pub fn into_delta(self) -> Tensor<Backend, 1> {
        match self {
            RollbackOutcome::Applied(delta)
            | RollbackOutcome::NoHistory(delta)
            | RollbackOutcome::OutOfRange { delta, .. } => delta,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, RollbackOutcome::Applied(_))
    }
}

/// Quantized corrections accepted during the most recent forward call
///
/// The history is a per-call ledger: [`CorrectionHistory::replace`] overwrites it
/// on every call, and the buffer always equals the sum of the stored entries.
#[derive(Debug, Clone)]
pub struct CorrectionHistory {
    hidden_dim: usize,
    device: Device,

    /// Quantized corrections in acceptance order, each [hidden_dim]
    entries: Vec<Tensor<Backend, 1>>,

    /// Elementwise sum of `entries`; zero when empty
    buffer: Tensor<Backend, 1>,
}

impl CorrectionHistory {
    pub fn new(hidden_dim: usize, device: &Device) -> Self {
        Self {
            hidden_dim,
            device: device.clone(),
            entries: Vec::new(),
            buffer: Tensor::zeros([hidden_dim], device),
        }
    }

    /// Replace the ledger with one call's quantized corrections
    pub fn replace(&mut self, entries: Vec<Tensor<Backend, 1>>) {
        self.buffer = entries
            .iter()
            .cloned()
            .fold(Tensor::zeros([self.hidden_dim], &self.device), |sum, entry| {
                sum + entry
            });
        self.entries = entries;
    }

    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }

    /// Delta that undoes the selected corrections of the most recent call
    pub fn rollback(&self, step: RollbackStep) -> RollbackOutcome {
        if self.entries.is_empty() {
            return RollbackOutcome::NoHistory(self.zeros());
        }

        match step {
            RollbackStep::All => RollbackOutcome::Applied(self.buffer.clone().neg()),
            RollbackStep::Index(index) if index < self.entries.len() => {
                RollbackOutcome::Applied(self.entries[index].clone().neg())
            }
            RollbackStep::Index(index) => self.out_of_range(index as i64),
            RollbackStep::Invalid(step) => self.out_of_range(step),
        }
    }

    pub fn entries(&self) -> &[Tensor<Backend, 1>] {
        &self.entries
    }

    pub fn buffer(&self) -> &Tensor<Backend, 1> {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn out_of_range(&self, step: i64) -> RollbackOutcome {
        let len = self.entries.len();
        warn!(
            step,
            len,
            "Invalid rollback step {}, must be -1 or in range [0, {}]",
            step,
            len - 1
        );
        RollbackOutcome::OutOfRange {
            step,
            len,
            delta: self.zeros(),
        }
    }

    fn zeros(&self) -> Tensor<Backend, 1> {
        Tensor::zeros([self.hidden_dim], &self.device)
    }
}
