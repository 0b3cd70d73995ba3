//! Interval tensors for derest.
//!
//! Two realizations of the [`Interval`] capability live here:
//!
//! - [`BoundedTensor`]: eager lower/upper arrays, with every layer kernel.
//! - [`SymbolicInterval`]: a deferred expression graph evaluated against
//!   [`Bindings`], with shared subgraphs computed once.
//!
//! The [`kernels`] module holds the eager layer kernels (convolution,
//! pooling, softmax, local response normalization, ReLU) that both
//! realizations end up calling.

pub mod bounded;
pub mod broadcast;
pub mod interval;
pub mod kernels;
pub mod symbolic;

pub use bounded::BoundedTensor;
pub use broadcast::broadcast_shapes;
pub use interval::Interval;
pub use kernels::ConvParams;
pub use symbolic::{eval_many, Bindings, Evaluator, SymbolicInterval};

pub use derest_core::{
    Bound, DerestError, Exponent, Fill, IntervalConfig, LrnParams, PoolMode, PoolParams, Result,
};

#[cfg(test)]
mod tests;
