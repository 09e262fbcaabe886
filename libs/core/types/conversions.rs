//! Type conversion utilities for Python-Rust interoperability
//!
//! Nested Python lists `[batch][seq][hidden]` are converted to and from Burn
//! tensors here, along with the mapping of layer errors onto Python exceptions.

use burn::tensor::{Tensor, TensorData};
use policy::{Backend, Device, LayerError, to_vec};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

/// Error handling utilities for type conversions
pub trait ConversionResult<T> {
    /// Convert a Result to a PyResult with enhanced error context
    fn with_context(self, context: &str) -> PyResult<T>;
}

impl<T, E> ConversionResult<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_context(self, context: &str) -> PyResult<T> {
        self.map_err(|e| PyRuntimeError::new_err(format!("{}: {}", context, e)))
    }
}

/// Map a layer error onto the matching Python exception
///
/// Caller mistakes (configuration, shapes) become `ValueError`, the rest `RuntimeError`.
pub fn layer_err(err: LayerError) -> PyErr {
    match err {
        LayerError::Config(_)
        | LayerError::InputShape { .. }
        | LayerError::ParameterShape { .. } => PyValueError::new_err(err.to_string()),
        LayerError::Initialization(_) | LayerError::TensorData(_) => {
            PyRuntimeError::new_err(err.to_string())
        }
    }
}

/// Build a `[batch, seq, hidden]` tensor from nested rows
///
/// Every axis must be non-empty and every row must have the same length.
pub fn tensor_from_nested(
    x: &[Vec<Vec<f32>>],
    device: &Device,
) -> Result<Tensor<Backend, 3>, String> {
    let batch = x.len();
    let seq = x.first().map_or(0, Vec::len);
    let hidden = x.first().and_then(|rows| rows.first()).map_or(0, Vec::len);
    if batch == 0 || seq == 0 || hidden == 0 {
        return Err(format!(
            "input must be a non-empty [batch][seq][hidden] list, got [{}][{}][{}]",
            batch, seq, hidden
        ));
    }

    let mut values = Vec::with_capacity(batch * seq * hidden);
    for (b, rows) in x.iter().enumerate() {
        if rows.len() != seq {
            return Err(format!(
                "sequence {} has length {}, expected {}",
                b,
                rows.len(),
                seq
            ));
        }
        for (s, row) in rows.iter().enumerate() {
            if row.len() != hidden {
                return Err(format!(
                    "token [{}][{}] has {} features, expected {}",
                    b,
                    s,
                    row.len(),
                    hidden
                ));
            }
            values.extend_from_slice(row);
        }
    }

    Ok(Tensor::from_data(
        TensorData::new(values, [batch, seq, hidden]),
        device,
    ))
}

/// Copy a `[batch, seq, hidden]` tensor into nested rows
pub fn nested_from_tensor(tensor: Tensor<Backend, 3>) -> Result<Vec<Vec<Vec<f32>>>, LayerError> {
    let [_, seq, hidden] = tensor.dims();
    let values = to_vec(tensor)?;

    Ok(values
        .chunks(seq * hidden)
        .map(|sequence| sequence.chunks(hidden).map(<[f32]>::to_vec).collect())
        .collect())
}

/// Copy every tensor of a list into a host vector
pub fn vectors(tensors: &[Tensor<Backend, 1>]) -> Result<Vec<Vec<f32>>, LayerError> {
    tensors.iter().map(|t| to_vec(t.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Vec<Vec<Vec<f32>>> {
        vec![
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
            vec![vec![7.0, 8.0, 9.0], vec![10.0, 11.0, 12.0]],
        ]
    }

    #[test]
    fn test_nested_lists_keep_row_major_layout() {
        let tensor = tensor_from_nested(&nested(), &Device::default()).unwrap();
        assert_eq!(tensor.dims(), [2, 2, 3]);
        assert_eq!(nested_from_tensor(tensor).unwrap(), nested());
    }

    #[test]
    fn test_ragged_input_is_rejected() {
        let mut x = nested();
        x[1][0].pop();
        let err = tensor_from_nested(&x, &Device::default()).unwrap_err();
        assert!(err.contains("token [1][0]"));

        let mut x = nested();
        x[1].pop();
        assert!(tensor_from_nested(&x, &Device::default()).is_err());
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(tensor_from_nested(&[], &Device::default()).is_err());
        assert!(tensor_from_nested(&[vec![]], &Device::default()).is_err());
        assert!(tensor_from_nested(&[vec![vec![]]], &Device::default()).is_err());
    }
}
