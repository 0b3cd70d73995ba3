//! The interval capability shared by every realization.
//!
//! Layer rules are written once against [`Interval`] and run unchanged on
//! the eager [`BoundedTensor`] and on the deferred
//! [`SymbolicInterval`](crate::SymbolicInterval). A realization supplies the
//! arithmetic primitives; the layer kernels are optional and default to
//! [`DerestError::NotSupported`], which lets a rule fall back to a composition
//! of primitives where one exists.

use crate::kernels::ConvParams;
use crate::{Bindings, BoundedTensor};
use derest_core::{
    DerestError, Exponent, Fill, IntervalConfig, LrnParams, PoolMode, PoolParams, Result,
};
use ndarray::{Array2, ArrayD};
use std::fmt::Debug;

/// A tensor of closed intervals `[lower, upper]`.
pub trait Interval: Clone + Debug + Send + Sync + Sized {
    /// Wrap explicit bound arrays, checking `lower <= upper` within
    /// `config.tolerance`.
    fn from_arrays(lower: ArrayD<f64>, upper: ArrayD<f64>, config: &IntervalConfig)
        -> Result<Self>;

    /// A tensor of `shape` filled with one pair, either explicit or taken
    /// from the preset selected by `fill`.
    fn from_shape(
        shape: &[usize],
        fill: Fill,
        lower: Option<f64>,
        upper: Option<f64>,
        config: &IntervalConfig,
    ) -> Result<Self>;

    /// Seed for backward propagation: the `n x n` identity as point intervals.
    fn derest_output(n_outputs: usize) -> Self;

    fn shape(&self) -> Vec<usize>;

    fn add(&self, other: &Self) -> Result<Self>;
    fn add_array(&self, other: &ArrayD<f64>) -> Result<Self>;
    fn add_scalar(&self, value: f64) -> Self;
    fn sub(&self, other: &Self) -> Result<Self>;

    /// Inverse of `add` on bounds: `(a.lower - b.lower, a.upper - b.upper)`.
    ///
    /// Only meaningful when `other` was previously added into `self`.
    fn antiadd(&self, other: &Self) -> Result<Self>;

    fn mul(&self, other: &Self) -> Result<Self>;
    fn mul_array(&self, other: &ArrayD<f64>) -> Result<Self>;
    fn scale(&self, factor: f64) -> Self;

    /// Quotient over the corner values. A divisor containing zero is not
    /// rejected; the result then holds infinities or NaN.
    fn div(&self, other: &Self) -> Result<Self>;
    fn div_array(&self, other: &ArrayD<f64>) -> Result<Self>;
    fn reciprocal(&self) -> Self;

    fn neg(&self) -> Self;
    fn exp(&self) -> Self;
    fn square(&self) -> Self;
    fn power(&self, exponent: Exponent) -> Self;

    /// `self · weights` for a rank-1 or rank-2 `self` and `weights` of shape
    /// `(n_in, n_out)`.
    fn dot(&self, weights: &Array2<f64>) -> Result<Self>;

    fn max(&self, other: &Self) -> Result<Self>;
    fn max_scalar(&self, value: f64) -> Self;
    fn abs(&self) -> Self;

    fn reshape(&self, shape: &[usize]) -> Result<Self>;

    /// Materialize the bounds. Eager tensors ignore `bindings`.
    fn eval(&self, bindings: &Bindings) -> Result<BoundedTensor>;

    /// Materialize several tensors at once, sharing any common work.
    fn eval_many(items: &[&Self], bindings: &Bindings) -> Result<Vec<BoundedTensor>> {
        items.iter().map(|item| item.eval(bindings)).collect()
    }

    /// Whether every bound is finite, when that is known without evaluating.
    fn all_finite(&self) -> Option<bool> {
        None
    }

    fn op_relu(&self) -> Result<Self> {
        Err(DerestError::not_supported("relu kernel"))
    }

    /// Softmax over the last axis.
    fn op_softmax(&self) -> Result<Self> {
        Err(DerestError::not_supported("softmax kernel"))
    }

    fn op_norm(&self, _params: &LrnParams) -> Result<Self> {
        Err(DerestError::not_supported("local response normalization kernel"))
    }

    fn op_conv(&self, _conv: &ConvParams) -> Result<Self> {
        Err(DerestError::not_supported("convolution kernel"))
    }

    fn op_pool(&self, _pool: &PoolParams, _mode: PoolMode) -> Result<Self> {
        Err(DerestError::not_supported("pooling kernel"))
    }

    /// Derivative of ReLU; `self` is the incoming derivative and
    /// `activation` the layer input.
    fn op_d_relu(&self, _activation: &Self) -> Result<Self> {
        Err(DerestError::not_supported("relu derivative kernel"))
    }

    fn op_d_max_pool(&self, _activation: &Self, _pool: &PoolParams) -> Result<Self> {
        Err(DerestError::not_supported("max-pool derivative kernel"))
    }

    fn op_d_avg_pool(&self, _input_shape: &[usize], _pool: &PoolParams) -> Result<Self> {
        Err(DerestError::not_supported("avg-pool derivative kernel"))
    }

    fn op_d_norm(&self, _activation: &Self, _params: &LrnParams) -> Result<Self> {
        Err(DerestError::not_supported("normalization derivative kernel"))
    }

    fn op_d_conv(&self, _input_shape: &[usize], _conv: &ConvParams) -> Result<Self> {
        Err(DerestError::not_supported("convolution derivative kernel"))
    }
}
