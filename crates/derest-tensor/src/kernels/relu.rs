//! ReLU and its derivative.

use crate::broadcast::view_as;
use crate::BoundedTensor;
use derest_core::Result;
use ndarray::Zip;

pub fn relu(input: &BoundedTensor) -> BoundedTensor {
    BoundedTensor::new_unchecked(
        input.lower.mapv(|v| v.max(0.0)),
        input.upper.mapv(|v| v.max(0.0)),
    )
}

/// Pull `dout` back through a ReLU whose input was `activation`.
///
/// A surely positive input passes `dout` through and a surely negative one
/// blocks it. Anything else has slope 0 or 1, so the result is the hull of
/// zero and `dout`. `activation` broadcasts against `dout`, which lets a
/// single-batch activation serve every row of a seeded derivative.
pub fn d_relu(dout: &BoundedTensor, activation: &BoundedTensor) -> Result<BoundedTensor> {
    let shape = dout.shape().to_vec();
    let act_lo = view_as(&activation.lower, &shape)?;
    let act_hi = view_as(&activation.upper, &shape)?;

    let lower = Zip::from(&dout.lower)
        .and(&act_lo)
        .and(&act_hi)
        .map_collect(|&d, &lo, &hi| {
            if lo > 0.0 {
                d
            } else if hi < 0.0 {
                0.0
            } else {
                d.min(0.0)
            }
        });
    let upper = Zip::from(&dout.upper)
        .and(&act_lo)
        .and(&act_hi)
        .map_collect(|&d, &lo, &hi| {
            if lo > 0.0 {
                d
            } else if hi < 0.0 {
                0.0
            } else {
                d.max(0.0)
            }
        });
    Ok(BoundedTensor::new_unchecked(lower, upper))
}
