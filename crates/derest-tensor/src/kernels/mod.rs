//! Eager layer kernels over [`BoundedTensor`](crate::BoundedTensor).
//!
//! Spatial kernels use the `(batch, channels, height, width)` layout.

pub mod conv;
pub mod norm;
pub mod pool;
pub mod relu;
pub mod softmax;

pub use conv::{conv_backward, conv_forward, ConvParams};
pub use norm::{norm_backward, norm_forward};
pub use pool::{avg_pool_backward, max_pool_backward, pool_forward, pool_output_shape};
pub use relu::{d_relu, relu};
pub use softmax::softmax;

use derest_core::{DerestError, Result};
use ndarray::{ArrayD, ArrayView4, Ix4};

/// View a dynamic array as `(batch, channels, height, width)`.
pub(crate) fn as_rank4(array: &ArrayD<f64>) -> Result<ArrayView4<'_, f64>> {
    array
        .view()
        .into_dimensionality::<Ix4>()
        .map_err(|_| DerestError::RankMismatch {
            expected: 4,
            got: array.shape().to_vec(),
        })
}

/// Index into the unpadded input hit by tap `k` of window `out`, if any.
#[inline]
pub(crate) fn tap(out: usize, k: usize, stride: usize, padding: usize, extent: usize) -> Option<usize> {
    (out * stride + k)
        .checked_sub(padding)
        .filter(|&i| i < extent)
}

/// Batch index of an activation that may carry a single broadcast batch.
#[inline]
pub(crate) fn act_batch(act_batches: usize, b: usize) -> usize {
    if act_batches == 1 {
        0
    } else {
        b
    }
}

/// Check that an activation batch broadcasts against `batches`.
pub(crate) fn check_act_batches(act_shape: &[usize], batches: usize) -> Result<()> {
    if act_shape[0] != 1 && act_shape[0] != batches {
        let mut expected = act_shape.to_vec();
        expected[0] = batches;
        return Err(DerestError::shape_mismatch(expected, act_shape.to_vec()));
    }
    Ok(())
}
