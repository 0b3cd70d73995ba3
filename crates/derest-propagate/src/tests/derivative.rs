//! Derivative rules of the individual layers.

use crate::*;
use approx::assert_abs_diff_eq;
use derest_core::LrnParams;
use ndarray::{arr1, arr2, arr3, ArrayD, IxDyn};

fn point(values: ArrayD<f64>) -> BoundedTensor {
    BoundedTensor::concrete(values)
}

fn itv(lower: ArrayD<f64>, upper: ArrayD<f64>) -> BoundedTensor {
    BoundedTensor::new(lower, upper).unwrap()
}

/// Only the shape of the activation matters to the fully-connected rule.
fn activation_of_shape(shape: &[usize]) -> BoundedTensor {
    point(ArrayD::zeros(IxDyn(shape)))
}

// ============================================================
// FULLY CONNECTED
// ============================================================

#[test]
fn test_fc_1d_simple() {
    let layer = FullyConnectedLayer::from_weights(arr2(&[[2.0]]));
    let din = layer
        .derivative(&point(arr2(&[[1.0]]).into_dyn()), &activation_of_shape(&[1, 1]))
        .unwrap();
    assert_eq!(din.lower, din.upper);
    assert_eq!(din.lower, arr2(&[[2.0]]).into_dyn());
}

#[test]
fn test_fc_single_input_two_outputs() {
    let layer = FullyConnectedLayer::from_weights(arr2(&[[9.0, 12.0]]));
    let din = layer
        .derivative(&point(arr2(&[[3.0, 6.0]]).into_dyn()), &activation_of_shape(&[1, 1]))
        .unwrap();
    assert_eq!(din.lower, arr2(&[[99.0]]).into_dyn());
}

#[test]
fn test_fc_zero_output_column() {
    let layer = FullyConnectedLayer::from_weights(arr2(&[[6.0, 0.0], [9.0, 0.0]]));
    let din = layer
        .derivative(&point(arr2(&[[3.0, 0.0]]).into_dyn()), &activation_of_shape(&[1, 2]))
        .unwrap();
    assert_eq!(din.lower, arr2(&[[18.0, 27.0]]).into_dyn());
}

#[test]
fn test_fc_2d() {
    let layer = FullyConnectedLayer::from_weights(arr2(&[[9.0, 15.0], [12.0, 18.0]]));
    let din = layer
        .derivative(&point(arr2(&[[3.0, 6.0]]).into_dyn()), &activation_of_shape(&[1, 2]))
        .unwrap();
    assert_eq!(din.lower, din.upper);
    assert_eq!(din.lower, arr2(&[[117.0, 144.0]]).into_dyn());
}

#[test]
fn test_fc_intervals_reshaped_to_activation() {
    let layer = FullyConnectedLayer::from_weights(arr2(&[
        [2.0, -3.0, -3.0],
        [-3.0, 1.0, 2.0],
        [5.0, -4.0, 3.0],
        [-2.0, -3.0, -4.0],
    ]));
    let dout = itv(
        arr2(&[[-3.0, -6.0, 3.0]]).into_dyn(),
        arr2(&[[9.0, -3.0, 6.0]]).into_dyn(),
    );
    let din = layer.derivative(&dout, &activation_of_shape(&[1, 2, 2])).unwrap();
    assert_eq!(din.shape(), &[1, 2, 2]);
    assert_eq!(din.lower, arr3(&[[[-15.0, -27.0], [6.0, -33.0]]]).into_dyn());
    assert_eq!(din.upper, arr3(&[[[27.0, 18.0], [87.0, 12.0]]]).into_dyn());
}

#[test]
fn test_fc_batches() {
    let layer = FullyConnectedLayer::from_weights(arr2(&[[9.0, 15.0], [12.0, 18.0]]));
    let din = layer
        .derivative(
            &point(arr2(&[[3.0, 6.0], [1.0, 2.0]]).into_dyn()),
            &activation_of_shape(&[1, 2]),
        )
        .unwrap();
    assert_eq!(din.lower, arr2(&[[117.0, 144.0], [39.0, 48.0]]).into_dyn());
}

#[test]
fn test_fc_batches_symbolic() {
    let layer = FullyConnectedLayer::from_weights(arr2(&[[9.0, 15.0], [12.0, 18.0]]));
    let dout = SymbolicInterval::input("dout", &[2, 2]);
    let act = SymbolicInterval::input("act", &[1, 2]);
    let din = layer.derivative(&dout, &act).unwrap();
    assert_eq!(din.shape(), vec![2, 2]);

    let bindings = Bindings::new()
        .bind("dout", point(arr2(&[[3.0, 6.0], [1.0, 2.0]]).into_dyn()))
        .bind("act", activation_of_shape(&[1, 2]));
    let din = din.eval(&bindings).unwrap();
    assert_eq!(din.lower, din.upper);
    assert_eq!(din.lower, arr2(&[[117.0, 144.0], [39.0, 48.0]]).into_dyn());
}

// ============================================================
// SOFTMAX
// ============================================================

#[test]
fn test_softmax_one_output() {
    let dout = BoundedTensor::derest_output(1);
    let din = SoftmaxLayer.derivative(&dout, &activation_of_shape(&[1, 1])).unwrap();
    assert_eq!(din.lower, arr2(&[[1.0]]).into_dyn());
    assert_eq!(din.lower, din.upper);
}

#[test]
fn test_softmax_three_outputs() {
    let dout = BoundedTensor::derest_output(3);
    let din = SoftmaxLayer.derivative(&dout, &activation_of_shape(&[1, 3])).unwrap();
    assert_eq!(din.lower, ndarray::Array2::<f64>::eye(3).into_dyn());
    assert_eq!(din.lower, din.upper);
}

// ============================================================
// LOCAL RESPONSE NORMALIZATION
// ============================================================

fn lrn_layer() -> NormLayer {
    NormLayer::new(LrnParams::new(5, 1.0, 1e-4, 0.75)).unwrap()
}

#[test]
fn test_norm_simple() {
    let x = point(ArrayD::from_elem(IxDyn(&[1, 1, 1, 1]), 100.0));
    let din = lrn_layer().derivative(&x, &x).unwrap();
    assert_abs_diff_eq!(din.lower[[0, 0, 0, 0]], 65.4146962, epsilon = 1e-6);
    assert_abs_diff_eq!(din.upper[[0, 0, 0, 0]], 65.4146962, epsilon = 1e-6);
}

#[test]
fn test_norm_two_channels_symmetric() {
    let x = point(ArrayD::from_elem(IxDyn(&[1, 2, 1, 1]), 100.0));
    let din = lrn_layer().derivative(&x, &x).unwrap();
    assert_abs_diff_eq!(din.lower[[0, 0, 0, 0]], din.lower[[0, 1, 0, 0]], epsilon = 1e-12);
    assert_abs_diff_eq!(din.upper[[0, 0, 0, 0]], din.upper[[0, 1, 0, 0]], epsilon = 1e-12);
    // The neighbour's denominator pulls the impact below the single-channel value.
    assert!(din.upper[[0, 0, 0, 0]] < 65.4146962);
}

#[test]
fn test_norm_rejects_bad_params() {
    assert!(NormLayer::new(LrnParams::new(0, 1.0, 1e-4, 0.75)).is_err());
}

// ============================================================
// DROPOUT
// ============================================================

#[test]
fn test_dropout_interval_3x3() {
    let dout = itv(
        arr2(&[[-3.0, 0.0, 3.0], [3.0, -3.0, -5.0], [-3.0, -2.0, 1.0]]).into_dyn(),
        arr2(&[[-3.0, 2.0, 3.0], [5.0, 3.0, 2.0], [-1.0, 3.0, 3.0]]).into_dyn(),
    );
    let layer = DropoutLayer::new(0.8).unwrap();
    let din = layer.derivative(&dout, &dout).unwrap();
    let rl = arr2(&[[-0.6, 0.0, 0.6], [0.6, -0.6, -1.0], [-0.6, -0.4, 0.2]]);
    let ru = arr2(&[[-0.6, 0.4, 0.6], [1.0, 0.6, 0.4], [-0.2, 0.6, 0.6]]);
    for ((l, u), (el, eu)) in din
        .lower
        .iter()
        .zip(din.upper.iter())
        .zip(rl.iter().zip(ru.iter()))
    {
        assert_abs_diff_eq!(*l, *el, epsilon = 1e-12);
        assert_abs_diff_eq!(*u, *eu, epsilon = 1e-12);
    }
}

#[test]
fn test_dropout_probability_range() {
    assert!(DropoutLayer::new(1.2).is_err());
    assert!(DropoutLayer::new(-0.1).is_err());
    let act = DropoutLayer::new(0.5)
        .unwrap()
        .activation(&point(arr1(&[4.0]).into_dyn()))
        .unwrap();
    assert_eq!(act.lower[[0]], 2.0);
}

// ============================================================
// RELU
// ============================================================

#[test]
fn test_relu_4x3x2() {
    let shape = [4, 3, 2];
    let act = ArrayD::from_shape_fn(IxDyn(&shape), |idx| {
        (100 * idx[0] + 10 * idx[1] + idx[2]) as f64
    });
    let din = ReluLayer
        .derivative(&point(ArrayD::ones(IxDyn(&shape))), &point(act))
        .unwrap();
    assert_eq!(din.lower[[0, 0, 0]], 0.0);
    assert_eq!(din.upper[[0, 0, 0]], 1.0);
    assert_eq!(din.lower[[2, 1, 1]], 1.0);
    assert_eq!(din.lower[[2, 2, 1]], 1.0);
    assert_eq!(din.lower[[1, 0, 1]], 1.0);
    assert_eq!(din.lower[[2, 2, 0]], 1.0);
}

#[test]
fn test_relu_interval() {
    let act = itv(
        arr1(&[-2.0, -1.0, -1.0, 0.0, 0.0, 1.0]).into_dyn(),
        arr1(&[-1.0, 1.0, 0.0, 0.0, 1.0, 2.0]).into_dyn(),
    );
    let dout = itv(
        arr1(&[2.0, 3.0, 4.0, 7.0, 11.0, 13.0]).into_dyn(),
        arr1(&[3.0, 5.0, 7.0, 11.0, 13.0, 17.0]).into_dyn(),
    );
    let din = ReluLayer.derivative(&dout, &act).unwrap();
    assert_eq!(din.lower, arr1(&[0.0, 0.0, 0.0, 0.0, 0.0, 13.0]).into_dyn());
    assert_eq!(din.upper, arr1(&[0.0, 5.0, 7.0, 11.0, 13.0, 17.0]).into_dyn());
}

#[test]
fn test_relu_interval_negative() {
    let act = itv(
        arr1(&[-2.0, -1.0, -1.0, 0.0, 0.0, 1.0]).into_dyn(),
        arr1(&[-1.0, 1.0, 0.0, 0.0, 1.0, 2.0]).into_dyn(),
    );
    let dout = itv(
        arr1(&[-3.0, -5.0, -7.0, -11.0, -13.0, -17.0]).into_dyn(),
        arr1(&[-2.0, -3.0, -5.0, -7.0, -11.0, -13.0]).into_dyn(),
    );
    let din = ReluLayer.derivative(&dout, &act).unwrap();
    assert_eq!(din.lower, arr1(&[0.0, -5.0, -7.0, -11.0, -13.0, -17.0]).into_dyn());
    assert_eq!(din.upper, arr1(&[0.0, 0.0, 0.0, 0.0, 0.0, -13.0]).into_dyn());
}
