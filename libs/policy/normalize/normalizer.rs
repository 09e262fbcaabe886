use burn::tensor::Tensor;

use crate::constants::STD_FLOOR_FACTOR;
use crate::layer::LayerError;
use crate::{Backend, Device, scalar};

/// Normalized output plus the spread statistic the EMA tracker consumes
#[derive(Debug, Clone)]
pub struct Normalized {
    /// `[batch, seq, hidden_dim]`
    pub output: Tensor<Backend, 3>,

    /// Mean over tokens of the per-token std, before flooring
    pub mean_std: f64,
}

/// Per-token normalizer with gamma/beta
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Scale: [hidden_dim]
    gamma: Tensor<Backend, 1>,

    /// Shift: [hidden_dim]
    beta: Tensor<Backend, 1>,

    eps: f64,
}

impl Normalizer {
    /// Identity affine (gamma = 1, beta = 0)
    pub fn new(hidden_dim: usize, eps: f64, device: &Device) -> Self {
        Self {
            gamma: Tensor::ones([hidden_dim], device),
            beta: Tensor::zeros([hidden_dim], device),
            eps,
        }
    }

    pub fn forward(&self, x: Tensor<Backend, 3>) -> Normalized {
        let [_, _, hidden_dim] = x.dims();

        let mean = x.clone().mean_dim(2);
        let centered = x - mean;

        // Sample std; a single feature has no spread to correct for
        let dof = hidden_dim.saturating_sub(1).max(1) as f64;
        let std = (centered.clone() * centered.clone())
            .sum_dim(2)
            .div_scalar(dof)
            .sqrt();
        let mean_std = scalar(std.clone().mean());

        let std = std.clamp_min(self.eps * STD_FLOOR_FACTOR).add_scalar(self.eps);
        let output = centered / std * self.gamma.clone().reshape([1, 1, hidden_dim])
            + self.beta.clone().reshape([1, 1, hidden_dim]);

        Normalized { output, mean_std }
    }

    /// Replace gamma and beta
    pub fn set_affine(
        &mut self,
        gamma: Tensor<Backend, 1>,
        beta: Tensor<Backend, 1>,
    ) -> Result<(), LayerError> {
        let expected = self.gamma.dims();
        if gamma.dims() != expected {
            return Err(LayerError::parameter_shape("gamma", &expected, &gamma.dims()));
        }
        if beta.dims() != expected {
            return Err(LayerError::parameter_shape("beta", &expected, &beta.dims()));
        }
        self.gamma = gamma;
        self.beta = beta;
        Ok(())
    }

    pub fn gamma(&self) -> &Tensor<Backend, 1> {
        &self.gamma
    }

    pub fn beta(&self) -> &Tensor<Backend, 1> {
        &self.beta
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::TensorData;

    use super::*;
    use crate::to_vec;

    fn tokens(values: Vec<f32>, shape: [usize; 3]) -> Tensor<Backend, 3> {
        Tensor::from_data(TensorData::new(values, shape), &Device::default())
    }

    #[test]
    fn test_zero_mean_unit_std_per_token() {
        let normalizer = Normalizer::new(4, 1e-6, &Device::default());
        let result = normalizer.forward(tokens(
            vec![1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0],
            [1, 2, 4],
        ));

        let values = to_vec(result.output).unwrap();
        for token in values.chunks(4) {
            let mean: f32 = token.iter().sum::<f32>() / 4.0;
            let var: f32 = token.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 3.0;
            assert!(mean.abs() < 1e-5);
            assert!((var.sqrt() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_mean_std_reported_before_floor() {
        let normalizer = Normalizer::new(2, 1e-6, &Device::default());
        // token stds: |0-2|/sqrt(2) and 0
        let result = normalizer.forward(tokens(vec![0.0, 2.0, 5.0, 5.0], [1, 2, 2]));
        let expected = (2.0f64.sqrt()) / 2.0;
        assert!((result.mean_std - expected).abs() < 1e-5);

        // the constant token maps to zeros rather than NaN
        let values = to_vec(result.output).unwrap();
        assert!(values.iter().all(|v| v.is_finite()));
        assert_eq!(values[2], 0.0);
    }

    #[test]
    fn test_affine_parameters_applied() {
        let device = Device::default();
        let mut normalizer = Normalizer::new(2, 1e-6, &device);
        normalizer
            .set_affine(Tensor::full([2], 2.0, &device), Tensor::full([2], 1.0, &device))
            .unwrap();

        let values = to_vec(normalizer.forward(tokens(vec![-1.0, 1.0], [1, 1, 2])).output).unwrap();
        // normalized [-1/sqrt(2), 1/sqrt(2)] scaled by 2, shifted by 1
        let half = std::f32::consts::FRAC_1_SQRT_2;
        assert!((values[0] - (1.0 - 2.0 * half)).abs() < 1e-4);
        assert!((values[1] - (1.0 + 2.0 * half)).abs() < 1e-4);

        let result = normalizer.set_affine(Tensor::ones([3], &device), Tensor::zeros([2], &device));
        assert!(matches!(
            result,
            Err(LayerError::ParameterShape { name: "gamma", .. })
        ));
    }
}
