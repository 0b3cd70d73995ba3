//! Property-based soundness tests for the interval primitives.
//!
//! For any concrete operands inside the input bounds, the concrete result
//! must lie inside the computed bounds.

use crate::*;
use derest_core::Exponent;
use ndarray::{arr1, arr2};
use proptest::prelude::*;

const FP_TOLERANCE: f64 = 1e-9;

/// Strategy to generate valid interval bounds [lower, upper] where lower <= upper.
fn valid_interval(range: f64) -> impl Strategy<Value = (f64, f64)> {
    (-range..range).prop_flat_map(move |a| (-range..range).prop_map(move |b| (a.min(b), a.max(b))))
}

/// Evenly spaced points of [lower, upper], endpoints included.
fn sample_points(lower: f64, upper: f64, num_samples: usize) -> Vec<f64> {
    if lower == upper {
        return vec![lower];
    }
    (0..=num_samples)
        .map(|i| {
            let t = i as f64 / num_samples as f64;
            (lower + (upper - lower) * t).clamp(lower, upper)
        })
        .collect()
}

fn scalar(l: f64, u: f64) -> BoundedTensor {
    BoundedTensor::new(arr1(&[l]).into_dyn(), arr1(&[u]).into_dyn()).unwrap()
}

fn contains(t: &BoundedTensor, idx: usize, v: f64) -> bool {
    let scale = 1.0 + v.abs();
    t.lower[[idx]] - FP_TOLERANCE * scale <= v && v <= t.upper[[idx]] + FP_TOLERANCE * scale
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn soundness_mul((al, au) in valid_interval(50.0), (bl, bu) in valid_interval(50.0)) {
        let out = scalar(al, au).mul(&scalar(bl, bu)).unwrap();
        for a in sample_points(al, au, 8) {
            for b in sample_points(bl, bu, 8) {
                prop_assert!(contains(&out, 0, a * b), "{a} * {b} outside [{}, {}]", out.lower[[0]], out.upper[[0]]);
            }
        }
    }

    #[test]
    fn soundness_sub((al, au) in valid_interval(50.0), (bl, bu) in valid_interval(50.0)) {
        let out = scalar(al, au).sub(&scalar(bl, bu)).unwrap();
        for a in sample_points(al, au, 8) {
            for b in sample_points(bl, bu, 8) {
                prop_assert!(contains(&out, 0, a - b));
            }
        }
    }

    #[test]
    fn soundness_div_positive_divisor((al, au) in valid_interval(50.0), (bl, bu) in (0.5..20.0f64, 0.0..20.0f64)) {
        let bu = bl + bu;
        let out = scalar(al, au).div(&scalar(bl, bu)).unwrap();
        for a in sample_points(al, au, 8) {
            for b in sample_points(bl, bu, 8) {
                prop_assert!(contains(&out, 0, a / b));
            }
        }
    }

    #[test]
    fn soundness_square_and_abs((l, u) in valid_interval(30.0)) {
        let t = scalar(l, u);
        let sq = t.square();
        let ab = t.abs();
        for x in sample_points(l, u, 20) {
            prop_assert!(contains(&sq, 0, x * x));
            prop_assert!(contains(&ab, 0, x.abs()));
        }
    }

    #[test]
    fn soundness_exp_neg((l, u) in valid_interval(10.0)) {
        let t = scalar(l, u);
        let e = t.exp();
        let n = t.neg();
        for x in sample_points(l, u, 20) {
            prop_assert!(contains(&e, 0, x.exp()));
            prop_assert!(contains(&n, 0, -x));
        }
    }

    #[test]
    fn soundness_integer_power((l, u) in valid_interval(5.0), n in 1i32..6) {
        let out = scalar(l, u).power(Exponent::Int(n));
        for x in sample_points(l, u, 20) {
            prop_assert!(contains(&out, 0, x.powi(n)));
        }
    }

    #[test]
    fn soundness_dot(
        (l0, u0) in valid_interval(10.0),
        (l1, u1) in valid_interval(10.0),
        w in prop::array::uniform4(-5.0..5.0f64),
    ) {
        let x = BoundedTensor::new(arr1(&[l0, l1]).into_dyn(), arr1(&[u0, u1]).into_dyn()).unwrap();
        let weights = arr2(&[[w[0], w[1]], [w[2], w[3]]]);
        let out = x.dot(&weights).unwrap();
        for a in sample_points(l0, u0, 6) {
            for b in sample_points(l1, u1, 6) {
                prop_assert!(contains(&out, 0, a * w[0] + b * w[2]));
                prop_assert!(contains(&out, 1, a * w[1] + b * w[3]));
            }
        }
    }

    #[test]
    fn soundness_softmax(
        (l0, u0) in valid_interval(5.0),
        (l1, u1) in valid_interval(5.0),
        (l2, u2) in valid_interval(5.0),
    ) {
        let x = BoundedTensor::new(arr1(&[l0, l1, l2]).into_dyn(), arr1(&[u0, u1, u2]).into_dyn()).unwrap();
        let out = x.op_softmax().unwrap();
        for a in sample_points(l0, u0, 4) {
            for b in sample_points(l1, u1, 4) {
                for c in sample_points(l2, u2, 4) {
                    let total = a.exp() + b.exp() + c.exp();
                    for (i, v) in [a, b, c].iter().enumerate() {
                        prop_assert!(contains(&out, i, v.exp() / total));
                    }
                }
            }
        }
    }
}
