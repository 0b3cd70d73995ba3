//! Max and average pooling over intervals, forward and backward.
//!
//! Window `(oy, ox)` covers padded rows `oy * sy .. oy * sy + ph` and the
//! matching columns. Padding cells hold the value 0 and never receive a
//! derivative. Border windows that do not fit are dropped.

use super::{act_batch, as_rank4, check_act_batches, tap};
use crate::BoundedTensor;
use derest_core::{DerestError, PoolMode, PoolParams, Result};
use ndarray::{Array4, ArrayView4};

/// Output shape of pooling an input of `(batch, channels, height, width)`.
pub fn pool_output_shape(input_shape: &[usize], pool: &PoolParams) -> Result<Vec<usize>> {
    pool.validate()?;
    let &[batch, channels, height, width] = input_shape else {
        return Err(DerestError::RankMismatch {
            expected: 4,
            got: input_shape.to_vec(),
        });
    };
    let (oh, ow) = pool.output_dims(height, width)?;
    Ok(vec![batch, channels, oh, ow])
}

/// Real input cells of one window, and whether it overlaps the padding.
fn window(oy: usize, ox: usize, pool: &PoolParams, height: usize, width: usize) -> (Vec<(usize, usize)>, bool) {
    let (ph, pw) = pool.poolsize;
    let mut cells = Vec::with_capacity(ph * pw);
    for ky in 0..ph {
        let Some(iy) = tap(oy, ky, pool.stride.0, pool.padding.0, height) else {
            continue;
        };
        for kx in 0..pw {
            if let Some(ix) = tap(ox, kx, pool.stride.1, pool.padding.1, width) {
                cells.push((iy, ix));
            }
        }
    }
    let padded = cells.len() < ph * pw;
    (cells, padded)
}

fn pool_bound(input: ArrayView4<f64>, pool: &PoolParams, mode: PoolMode, out_shape: &[usize]) -> Array4<f64> {
    let (batch, channels, height, width) = input.dim();
    let (oh, ow) = (out_shape[2], out_shape[3]);
    let area = (pool.poolsize.0 * pool.poolsize.1) as f64;
    let mut out = Array4::zeros((batch, channels, oh, ow));
    for oy in 0..oh {
        for ox in 0..ow {
            let (cells, padded) = window(oy, ox, pool, height, width);
            for b in 0..batch {
                for c in 0..channels {
                    let values = cells.iter().map(|&(iy, ix)| input[[b, c, iy, ix]]);
                    out[[b, c, oy, ox]] = match mode {
                        PoolMode::Max => {
                            let init = if padded { 0.0 } else { f64::NEG_INFINITY };
                            values.fold(init, f64::max)
                        }
                        PoolMode::Avg => values.sum::<f64>() / area,
                    };
                }
            }
        }
    }
    out
}

/// Pool each bound separately; both max and mean are monotone.
pub fn pool_forward(input: &BoundedTensor, pool: &PoolParams, mode: PoolMode) -> Result<BoundedTensor> {
    let out_shape = pool_output_shape(input.shape(), pool)?;
    let lower = pool_bound(as_rank4(&input.lower)?, pool, mode, &out_shape);
    let upper = pool_bound(as_rank4(&input.upper)?, pool, mode, &out_shape);
    Ok(BoundedTensor::new_unchecked(lower.into_dyn(), upper.into_dyn()))
}

/// Check `dout` against the pooled shape of `input_shape` and return the
/// shape of the derivative: `dout`'s batch with the input's other axes.
fn backward_shape(dout: &BoundedTensor, input_shape: &[usize], pool: &PoolParams) -> Result<Vec<usize>> {
    let expected = pool_output_shape(input_shape, pool)?;
    let dout_shape = dout.shape();
    if dout_shape.len() != 4 || dout_shape[1..] != expected[1..] {
        let mut want = expected;
        want[0] = dout_shape.first().copied().unwrap_or(0);
        return Err(DerestError::shape_mismatch(want, dout_shape.to_vec()));
    }
    let mut shape = input_shape.to_vec();
    shape[0] = dout_shape[0];
    Ok(shape)
}

/// Pull `dout` back through a max pool whose input was `activation`.
///
/// A cell may be the maximum of its window when its upper bound reaches the
/// largest lower bound in the window. Every such cell may receive the
/// window's derivative or nothing, so it accumulates the hull of zero and
/// `dout`.
pub fn max_pool_backward(dout: &BoundedTensor, activation: &BoundedTensor, pool: &PoolParams) -> Result<BoundedTensor> {
    let shape = backward_shape(dout, activation.shape(), pool)?;
    check_act_batches(activation.shape(), shape[0])?;
    let act_lo = as_rank4(&activation.lower)?;
    let act_hi = as_rank4(&activation.upper)?;
    let dl = as_rank4(&dout.lower)?;
    let du = as_rank4(&dout.upper)?;
    let (batch, channels, height, width) = (shape[0], shape[1], shape[2], shape[3]);
    let (_, _, oh, ow) = dl.dim();
    let act_batches = act_lo.dim().0;

    let mut lower = Array4::zeros((batch, channels, height, width));
    let mut upper = Array4::zeros((batch, channels, height, width));
    for oy in 0..oh {
        for ox in 0..ow {
            let (cells, padded) = window(oy, ox, pool, height, width);
            for b in 0..batch {
                let ab = act_batch(act_batches, b);
                for c in 0..channels {
                    let init = if padded { 0.0 } else { f64::NEG_INFINITY };
                    let max_lower = cells
                        .iter()
                        .map(|&(iy, ix)| act_lo[[ab, c, iy, ix]])
                        .fold(init, f64::max);
                    let d_lo = dl[[b, c, oy, ox]].min(0.0);
                    let d_hi = du[[b, c, oy, ox]].max(0.0);
                    for &(iy, ix) in &cells {
                        if act_hi[[ab, c, iy, ix]] >= max_lower {
                            lower[[b, c, iy, ix]] += d_lo;
                            upper[[b, c, iy, ix]] += d_hi;
                        }
                    }
                }
            }
        }
    }
    Ok(BoundedTensor::new_unchecked(lower.into_dyn(), upper.into_dyn()))
}

/// Pull `dout` back through an average pool over an input of `input_shape`:
/// every real cell of a window receives `dout / (ph * pw)`.
pub fn avg_pool_backward(dout: &BoundedTensor, input_shape: &[usize], pool: &PoolParams) -> Result<BoundedTensor> {
    let shape = backward_shape(dout, input_shape, pool)?;
    let dl = as_rank4(&dout.lower)?;
    let du = as_rank4(&dout.upper)?;
    let (batch, channels, height, width) = (shape[0], shape[1], shape[2], shape[3]);
    let (_, _, oh, ow) = dl.dim();
    let area = (pool.poolsize.0 * pool.poolsize.1) as f64;

    let mut lower = Array4::zeros((batch, channels, height, width));
    let mut upper = Array4::zeros((batch, channels, height, width));
    for oy in 0..oh {
        for ox in 0..ow {
            let (cells, _) = window(oy, ox, pool, height, width);
            for b in 0..batch {
                for c in 0..channels {
                    let d_lo = dl[[b, c, oy, ox]] / area;
                    let d_hi = du[[b, c, oy, ox]] / area;
                    for &(iy, ix) in &cells {
                        lower[[b, c, iy, ix]] += d_lo;
                        upper[[b, c, iy, ix]] += d_hi;
                    }
                }
            }
        }
    }
    Ok(BoundedTensor::new_unchecked(lower.into_dyn(), upper.into_dyn()))
}
