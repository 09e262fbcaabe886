use burn::tensor::{Tensor, TensorData, activation};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

use crate::constants::{GATE_INIT_LOGIT, SPARSITY_COEFFICIENT};
use crate::layer::{LayerConfig, LayerError};
use crate::{Backend, Device, scalar};

/// Projected batch together with the weighted matrix that produced it
///
/// The correction engine maps deviations back to input space through the same
/// weighted matrix, so it is returned alongside the projection.
#[derive(Debug, Clone)]
pub struct Projection {
    /// `[batch, seq, ref_dim]`
    pub projected: Tensor<Backend, 3>,

    /// `[ref_dim, hidden_dim]`, gated for the scale that was projected
    pub weighted: Tensor<Backend, 2>,
}

/// Gated linear projector shared by every scale
#[derive(Debug, Clone)]
pub struct Projector {
    /// Projection matrix: [ref_dim, hidden_dim]
    weight: Tensor<Backend, 2>,

    /// Projection bias: [ref_dim]
    bias: Tensor<Backend, 1>,

    /// One gating row of logits per scale, each [ref_dim]
    gates: Vec<Tensor<Backend, 1>>,

    hidden_dim: usize,
    ref_dim: usize,
}

impl Projector {
    /// Create a projector from explicit parameters
    pub fn new(
        weight: Tensor<Backend, 2>,
        bias: Tensor<Backend, 1>,
        gates: Vec<Tensor<Backend, 1>>,
    ) -> Result<Self, LayerError> {
        let [ref_dim, hidden_dim] = weight.dims();
        check_shape("proj_bias", &[ref_dim], &bias.dims())?;
        for gate in &gates {
            check_shape("proj_weights", &[ref_dim], &gate.dims())?;
        }

        Ok(Self {
            weight,
            bias,
            gates,
            hidden_dim,
            ref_dim,
        })
    }

    /// Initialize a projector for the given configuration
    ///
    /// The matrix is drawn from N(0, 1/sqrt(hidden_dim)), the bias starts at zero
    /// and every gating logit starts at [`GATE_INIT_LOGIT`].
    pub fn init(config: &LayerConfig, device: &Device) -> Result<Self, LayerError> {
        let (hidden_dim, ref_dim) = (config.hidden_dim, config.ref_dim);
        let std = 1.0 / (hidden_dim as f32).sqrt();
        let normal =
            Normal::new(0.0f32, std).map_err(|e| LayerError::Initialization(e.to_string()))?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(rand::random()),
        };
        let values: Vec<f32> = (0..ref_dim * hidden_dim)
            .map(|_| rng.sample(normal))
            .collect();

        let weight = Tensor::from_data(TensorData::new(values, [ref_dim, hidden_dim]), device);
        let bias = Tensor::zeros([ref_dim], device);
        let gates = (0..config.num_scales())
            .map(|_| Tensor::full([ref_dim], GATE_INIT_LOGIT, device))
            .collect();

        Self::new(weight, bias, gates)
    }

    /// Sigmoid gate weights for a scale, each in (0, 1)
    pub fn gate_weights(&self, scale_idx: usize) -> Tensor<Backend, 1> {
        activation::sigmoid(self.gates[scale_idx].clone())
    }

    /// Projection matrix re-weighted row-wise by the scale's gate
    pub fn weighted_matrix(&self, scale_idx: usize) -> Tensor<Backend, 2> {
        let gate = self.gate_weights(scale_idx).reshape([self.ref_dim, 1]);
        self.weight.clone() * gate
    }

    /// Project `[batch, seq, hidden_dim]` into `[batch, seq, ref_dim]` at one scale
    ///
    /// The input is scaled before the affine map, so the scale also changes how the
    /// bias shifts the projected distribution.
    pub fn project(&self, x: Tensor<Backend, 3>, scale_idx: usize, scale: f64) -> Projection {
        let [batch, seq, hidden] = x.dims();
        let weighted = self.weighted_matrix(scale_idx);

        let flat = x.reshape([batch * seq, hidden]).mul_scalar(scale);
        let projected = flat.matmul(weighted.clone().transpose())
            + self.bias.clone().reshape([1, self.ref_dim]);

        Projection {
            projected: projected.reshape([batch, seq, self.ref_dim]),
            weighted,
        }
    }

    /// Sparsity regularizer: coefficient times the mean absolute gating logit
    pub fn sparsity_loss(&self) -> f64 {
        if self.gates.is_empty() {
            return 0.0;
        }

        // Rows share a length, so the mean of row means is the mean of the matrix
        let total: f64 = self
            .gates
            .iter()
            .map(|gate| scalar(gate.clone().abs().mean()))
            .sum();
        SPARSITY_COEFFICIENT * total / self.gates.len() as f64
    }

    /// Replace the projection matrix and bias
    pub fn set_projection(
        &mut self,
        weight: Tensor<Backend, 2>,
        bias: Tensor<Backend, 1>,
    ) -> Result<(), LayerError> {
        check_shape("proj", &[self.ref_dim, self.hidden_dim], &weight.dims())?;
        check_shape("proj_bias", &[self.ref_dim], &bias.dims())?;
        self.weight = weight;
        self.bias = bias;
        Ok(())
    }

    /// Replace all gating rows; the number of rows must not change
    pub fn set_gates(&mut self, gates: Vec<Tensor<Backend, 1>>) -> Result<(), LayerError> {
        check_shape("proj_weights", &[self.gates.len()], &[gates.len()])?;
        for gate in &gates {
            check_shape("proj_weights", &[self.ref_dim], &gate.dims())?;
        }
        self.gates = gates;
        Ok(())
    }

    pub fn weight(&self) -> &Tensor<Backend, 2> {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor<Backend, 1> {
        &self.bias
    }

    pub fn gates(&self) -> &[Tensor<Backend, 1>] {
        &self.gates
    }
}

fn check_shape(name: &'static str, expected: &[usize], actual: &[usize]) -> Result<(), LayerError> {
    if expected != actual {
        return Err(LayerError::parameter_shape(name, expected, actual));
    }
    Ok(())
}
