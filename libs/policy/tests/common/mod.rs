#![allow(dead_code)]

use burn::tensor::{Tensor, TensorData};
use policy::{AdaptiveBiasLayer, Backend, Device, LayerConfig, to_vec};

pub const HIDDEN_DIM: usize = 8;
pub const REF_DIM: usize = 4;

/// Gate logit that saturates the sigmoid to 1.0 in f32
pub const OPEN_GATE: f32 = 20.0;

pub fn config() -> LayerConfig {
    LayerConfig::new(HIDDEN_DIM)
        .with_ref_dim(REF_DIM)
        .with_scales(vec![1.0])
        .with_seed(42)
}

/// Layer projecting the first four features one-to-one with fully open gates
pub fn identity_layer(config: LayerConfig) -> AdaptiveBiasLayer {
    let device = Device::default();
    let num_scales = config.num_scales();
    let mut layer = AdaptiveBiasLayer::new(config, &device).unwrap();

    let mut weight = vec![0.0f32; REF_DIM * HIDDEN_DIM];
    for row in 0..REF_DIM {
        weight[row * HIDDEN_DIM + row] = 1.0;
    }
    layer
        .set_projection(
            Tensor::from_data(TensorData::new(weight, [REF_DIM, HIDDEN_DIM]), &device),
            Tensor::zeros([REF_DIM], &device),
        )
        .unwrap();
    layer
        .set_gates(
            (0..num_scales)
                .map(|_| Tensor::full([REF_DIM], OPEN_GATE, &device))
                .collect(),
        )
        .unwrap();
    layer
}

/// `[2, 2, 8]` batch whose first four features alternate `center ± 1` across tokens
///
/// Through the identity projection this gives mean `center` and population std 1
/// in every reference dimension.
pub fn batch(center: f32) -> Tensor<Backend, 3> {
    batch_sized(2, center)
}

pub fn batch_sized(batch: usize, center: f32) -> Tensor<Backend, 3> {
    let seq = 2;
    let mut values = Vec::with_capacity(batch * seq * HIDDEN_DIM);
    for token in 0..batch * seq {
        let offset = if token % 2 == 0 { -1.0 } else { 1.0 };
        for feature in 0..HIDDEN_DIM {
            if feature < REF_DIM {
                values.push(center + offset);
            } else {
                values.push(0.1 * (token * HIDDEN_DIM + feature) as f32);
            }
        }
    }
    Tensor::from_data(
        TensorData::new(values, [batch, seq, HIDDEN_DIM]),
        &Device::default(),
    )
}

pub fn values<const D: usize>(tensor: Tensor<Backend, D>) -> Vec<f32> {
    to_vec(tensor).unwrap()
}

pub fn assert_close(actual: &[f32], expected: &[f32], tolerance: f32) {
    assert_eq!(actual.len(), expected.len());
    for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "index {}: {} differs from {} by more than {}",
            index,
            a,
            e,
            tolerance
        );
    }
}
