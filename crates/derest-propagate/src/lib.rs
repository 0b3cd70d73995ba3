//! Derivative estimation (derest) for convolutional networks.
//!
//! A [`Network`] is an ordered list of [`Layer`] descriptors. Running
//! [`Network::derest`] walks the layers twice:
//!
//! - forward, bounding every layer's input activation for an input interval;
//! - backward, seeding the output with the identity and bounding how much
//!   every neuron can move each network output.
//!
//! The layer rules are written against [`Interval`], so the same network runs
//! on eager [`BoundedTensor`]s and on deferred [`SymbolicInterval`] graphs.
//!
//! # Parallel runs
//!
//! Independent derest runs over several inputs go through
//! [`parallel::ParallelDerest`].
//!
//! # Pruning
//!
//! [`pruning`] turns weights or derest results into per-neuron scores and
//! zeroes the least significant neurons of fully-connected layers.

pub mod layers;
pub mod network;
pub mod parallel;
pub mod pruning;
pub mod results;
pub mod types;

pub use layers::{
    a_relu, ConvolutionalLayer, DerestLayer, DropoutLayer, FullyConnectedLayer, Layer, NormLayer,
    PoolLayer, ReluLayer, SoftmaxLayer,
};
pub use network::{DerestResult, Network};
pub use parallel::{derest_parallel, ParallelConfig, ParallelDerest, ParallelDerestResult};
pub use pruning::{
    column_significance, delete_column, delete_row, derest_significance, least_significant,
    neuron_significance, simple_neuron_deleter, NeuronScore, PruningReport,
};
pub use results::{ResultPoint, ResultsError, ResultsTable};
pub use types::{DerestConfig, PruningConfig};

pub use derest_core::{DerestError, Fill, IntervalConfig, Result};
pub use derest_tensor::{Bindings, BoundedTensor, Interval, SymbolicInterval};

#[cfg(test)]
mod tests;
