use abrl_core::layer::PyAdaptiveLayer;
use pyo3::prelude::*;
use pyo3::types::PyDict;

fn module(py: Python<'_>) -> Bound<'_, PyAny> {
    pyo3::wrap_pymodule!(abrl_core::core)(py)
        .into_bound(py)
        .into_any()
}

/// Two sequences of two tokens, first feature alternating 2 / 4
fn shifted_input() -> Vec<Vec<Vec<f32>>> {
    let token = |first: f32| vec![first, 0.5, -0.5, 0.25];
    vec![
        vec![token(2.0), token(4.0)],
        vec![token(2.0), token(4.0)],
    ]
}

#[test]
fn test_pyo3_module_can_be_initialized() {
    Python::initialize();
    Python::attach(|py| {
        let module = module(py);
        assert!(module.getattr("AdaptiveBiasLayer").is_ok());
        assert!(module.getattr("Diagnostics").is_ok());
    });
}

#[test]
fn test_layer_keyword_construction() {
    Python::initialize();
    Python::attach(|py| {
        let class = module(py).getattr("AdaptiveBiasLayer").unwrap();
        let kwargs = PyDict::new(py);
        kwargs.set_item("ref_dim", 2).unwrap();
        kwargs.set_item("scales", vec![1.0]).unwrap();
        kwargs.set_item("seed", 3).unwrap();
        let layer = class.call((4,), Some(&kwargs)).unwrap();

        let repr: String = layer.repr().unwrap().extract().unwrap();
        assert!(repr.starts_with("AdaptiveBiasLayer(hidden_dim=4, ref_dim=2"));

        let training: bool = layer.getattr("training").unwrap().extract().unwrap();
        assert!(training);
    });
}

#[test]
fn test_invalid_configuration_raises_value_error() {
    Python::initialize();
    Python::attach(|py| {
        let class = module(py).getattr("AdaptiveBiasLayer").unwrap();
        let err = class.call1((0,)).unwrap_err();
        assert!(err.is_instance_of::<pyo3::exceptions::PyValueError>(py));
    });
}

#[test]
fn test_forward_returns_list_or_diagnostics() {
    Python::initialize();
    Python::attach(|py| {
        let layer = Bound::new(
            py,
            PyAdaptiveLayer::new(
                4,
                2,
                0.1,
                1e-6,
                0.1,
                0.95,
                Some(vec![1.0]),
                3,
                4.0,
                false,
                false,
                None,
                Some(5),
            )
            .unwrap(),
        )
        .unwrap();

        let output: Vec<Vec<Vec<f32>>> = layer
            .call_method1("forward", (shifted_input(),))
            .unwrap()
            .extract()
            .unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].len(), 2);
        assert_eq!(output[0][0].len(), 4);

        let kwargs = PyDict::new(py);
        kwargs.set_item("return_dict", true).unwrap();
        let diagnostics = layer
            .call_method("forward", (shifted_input(),), Some(&kwargs))
            .unwrap();
        let kl_values: Vec<f64> = diagnostics.getattr("kl_values").unwrap().extract().unwrap();
        assert_eq!(kl_values.len(), 1);

        let json: String = diagnostics.call_method0("to_json").unwrap().extract().unwrap();
        assert!(json.contains("\"kl_values\""));

        let delta: Vec<f32> = layer.call_method0("rollback").unwrap().extract().unwrap();
        assert_eq!(delta.len(), 4);
    });
}

#[test]
fn test_mismatched_input_raises_value_error() {
    Python::initialize();
    Python::attach(|py| {
        let layer = Bound::new(
            py,
            PyAdaptiveLayer::new(
                8, 2, 0.01, 1e-6, 0.1, 0.95, None, 3, 4.0, false, false, None,
                Some(1),
            )
            .unwrap(),
        )
        .unwrap();

        // hidden size 4 against hidden_dim 8
        let err = layer
            .call_method1("forward", (shifted_input(),))
            .unwrap_err();
        assert!(err.is_instance_of::<pyo3::exceptions::PyValueError>(py));
    });
}

#[test]
fn test_state_accessors() {
    let layer =
        PyAdaptiveLayer::new(4, 2, 0.01, 1e-6, 0.1, 0.95, None, 3, 4.0, true, false, None, Some(2))
            .unwrap();
    assert_eq!(layer.kl_ema(), 0.0);
    assert_eq!(layer.variance_ema(), 1.0);
    assert!(layer.reference_trainable());
    assert!((layer.get_sparsity_loss() - 0.01).abs() < 1e-9);
    assert!(layer.config_warnings().is_empty());
    assert_eq!(layer.inner().config().scales, vec![1.0, 0.5, 0.1]);
}
