//! Softmax over the last axis.

use crate::BoundedTensor;
use derest_core::{DerestError, Result};
use ndarray::{ArrayD, Axis, Zip};

/// Interval softmax along the last axis.
///
/// Component `i` is `1 / (1 + sum_{j != i} exp(x_j - x_i))`, which falls as
/// any other component grows and rises with `x_i`. Its lower bound pairs
/// the lower `x_i` with the upper others, and its upper bound the reverse.
pub fn softmax(input: &BoundedTensor) -> Result<BoundedTensor> {
    if input.lower.ndim() == 0 {
        return Err(DerestError::RankMismatch {
            expected: 1,
            got: Vec::new(),
        });
    }
    let axis = Axis(input.lower.ndim() - 1);
    let mut lower = ArrayD::zeros(input.lower.raw_dim());
    let mut upper = ArrayD::zeros(input.upper.raw_dim());

    Zip::from(lower.lanes_mut(axis))
        .and(upper.lanes_mut(axis))
        .and(input.lower.lanes(axis))
        .and(input.upper.lanes(axis))
        .for_each(|mut out_lo, mut out_hi, lo, hi| {
            let n = lo.len();
            for i in 0..n {
                let mut worst = 0.0;
                let mut best = 0.0;
                for j in (0..n).filter(|&j| j != i) {
                    worst += (hi[j] - lo[i]).exp();
                    best += (lo[j] - hi[i]).exp();
                }
                out_lo[i] = 1.0 / (1.0 + worst);
                out_hi[i] = 1.0 / (1.0 + best);
            }
        });
    Ok(BoundedTensor::new_unchecked(lower, upper))
}
