mod common;

use common::{HIDDEN_DIM, assert_close, batch, config, identity_layer, values};
use policy::correction::RollbackOutcome;

/// Two identical scales: corrections of -0.9 then -0.441, stored as -1.0 and -0.5
fn corrected_layer() -> policy::AdaptiveBiasLayer {
    let mut layer = identity_layer(config().with_alpha(0.1).with_scales(vec![1.0, 1.0]));
    layer.forward(batch(3.0), false).unwrap();
    layer
}

fn on_projected(value: f32) -> Vec<f32> {
    let mut expected = vec![0.0; HIDDEN_DIM];
    expected[..4].fill(value);
    expected
}

#[test]
fn test_history_and_buffer() {
    let layer = corrected_layer();
    let history = layer.compressed_history();

    assert_eq!(history.len(), 2);
    assert_eq!(values(history[0].clone()), on_projected(-1.0));
    assert_eq!(values(history[1].clone()), on_projected(-0.5));
    assert_eq!(values(layer.correction_buffer().clone()), on_projected(-1.5));
}

#[test]
fn test_rollback_all_cancels_buffer() {
    let layer = corrected_layer();

    let delta = layer.rollback(-1);
    assert_eq!(values(delta.clone()), on_projected(1.5));

    let residual = values(delta + layer.correction_buffer().clone());
    assert_close(&residual, &[0.0; HIDDEN_DIM], 0.0);
}

#[test]
fn test_rollback_single_step() {
    let layer = corrected_layer();
    assert_eq!(values(layer.rollback(0)), on_projected(1.0));
    assert_eq!(values(layer.rollback(1)), on_projected(0.5));
}

#[test]
fn test_out_of_range_rollback_is_recoverable() {
    let layer = corrected_layer();

    let outcome = layer.rollback_checked(2);
    assert!(matches!(
        outcome,
        RollbackOutcome::OutOfRange { step: 2, len: 2, .. }
    ));
    assert_eq!(values(outcome.into_delta()), vec![0.0; HIDDEN_DIM]);

    assert_eq!(values(layer.rollback(-4)), vec![0.0; HIDDEN_DIM]);
}

#[test]
fn test_rollback_without_history() {
    let layer = identity_layer(config());
    let outcome = layer.rollback_checked(-1);
    assert!(matches!(outcome, RollbackOutcome::NoHistory(_)));
    assert_eq!(values(outcome.into_delta()), vec![0.0; HIDDEN_DIM]);

    // monitoring never builds history either
    let mut layer = identity_layer(config().with_alpha(0.1).with_monitor_only(true));
    layer.forward(batch(3.0), false).unwrap();
    assert!(!layer.rollback_checked(-1).is_applied());
    assert_eq!(values(layer.rollback(0)), vec![0.0; HIDDEN_DIM]);
}

#[test]
fn test_rollback_only_sees_latest_call() {
    let mut layer = corrected_layer();
    layer.forward(batch(0.0), false).unwrap();
    assert!(matches!(
        layer.rollback_checked(-1),
        RollbackOutcome::NoHistory(_)
    ));
}
