//! Neuron scoring and deletion.
//!
//! A neuron of a fully-connected layer is a row of its `(n_in, n_out)`
//! weight matrix: its outgoing weights. Deleting a neuron zeroes that row.

use crate::layers::{FullyConnectedLayer, Layer};
use crate::network::{DerestResult, Network};
use crate::types::PruningConfig;
use derest_core::{DerestError, Result};
use derest_tensor::BoundedTensor;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Significance of one neuron.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuronScore {
    pub score: f64,
    pub neuron: usize,
    /// Position of the layer in the network.
    pub layer_id: usize,
}

impl NeuronScore {
    /// Ascending by score, then neuron, then layer.
    fn cmp_key(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.neuron.cmp(&other.neuron))
            .then(self.layer_id.cmp(&other.layer_id))
    }
}

/// Per row of `weights`, the share of the layer's total absolute weight.
///
/// A layer whose weights are all zero scores every neuron 0.
pub fn neuron_significance(weights: &Array2<f64>, layer_id: usize) -> Vec<NeuronScore> {
    let total: f64 = weights.iter().map(|w| w.abs()).sum();
    weights
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(neuron, row)| {
            let mass: f64 = row.iter().map(|w| w.abs()).sum();
            NeuronScore {
                score: if total > 0.0 { mass / total } else { 0.0 },
                neuron,
                layer_id,
            }
        })
        .collect()
}

/// Like [`neuron_significance`] over the columns: incoming weights of the
/// layer's output neurons.
pub fn column_significance(weights: &Array2<f64>, layer_id: usize) -> Vec<NeuronScore> {
    neuron_significance(&weights.t().to_owned(), layer_id)
}

/// Zero the outgoing weights of input neuron `row`.
pub fn delete_row(layer: &mut FullyConnectedLayer, row: usize) -> Result<()> {
    let n_in = layer.n_in();
    if row >= n_in {
        return Err(DerestError::invalid_parameter(format!(
            "row {row} out of range for {n_in} input neurons"
        )));
    }
    layer.weights.row_mut(row).fill(0.0);
    Ok(())
}

/// Zero the incoming weights of output neuron `column`.
pub fn delete_column(layer: &mut FullyConnectedLayer, column: usize) -> Result<()> {
    let n_out = layer.n_out();
    if column >= n_out {
        return Err(DerestError::invalid_parameter(format!(
            "column {column} out of range for {n_out} output neurons"
        )));
    }
    layer.weights.column_mut(column).fill(0.0);
    Ok(())
}

/// What [`simple_neuron_deleter`] did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PruningReport {
    /// Deleted neurons, in deletion order.
    pub deleted: Vec<NeuronScore>,
    /// Neuron count per considered layer.
    pub neurons_per_layer: BTreeMap<usize, usize>,
}

impl PruningReport {
    pub fn considered(&self) -> usize {
        self.neurons_per_layer.values().sum()
    }

    pub fn deleted_in_layer(&self, layer_id: usize) -> usize {
        self.deleted.iter().filter(|n| n.layer_id == layer_id).count()
    }

    /// Fraction of considered neurons that were deleted.
    pub fn fraction_deleted(&self) -> f64 {
        match self.considered() {
            0 => 0.0,
            n => self.deleted.len() as f64 / n as f64,
        }
    }
}

/// Delete the least significant neurons of the fully-connected layers.
///
/// Neurons are scored by [`neuron_significance`] and deleted in ascending
/// order until `p` of all of them are gone, skipping any neuron whose layer
/// already lost `layer_limit` of its neurons. When `layer_limit < p` at most
/// `layer_limit` of all neurons go.
pub fn simple_neuron_deleter(network: &mut Network, config: &PruningConfig) -> Result<PruningReport> {
    config.validate()?;
    let p = config.effective_p();

    let mut report = PruningReport::default();
    let mut candidates = Vec::new();
    for (layer_id, layer) in network.layers().iter().enumerate() {
        if let Layer::FullyConnected(fc) = layer {
            candidates.extend(neuron_significance(&fc.weights, layer_id));
            report.neurons_per_layer.insert(layer_id, fc.n_in());
        }
    }
    candidates.sort_by(NeuronScore::cmp_key);

    let total = report.considered() as f64;
    let mut deleted_per_layer: BTreeMap<usize, usize> = BTreeMap::new();
    for candidate in candidates {
        if report.deleted.len() as f64 >= p * total {
            break;
        }
        let in_layer = deleted_per_layer.entry(candidate.layer_id).or_insert(0);
        let layer_size = report.neurons_per_layer[&candidate.layer_id] as f64;
        if (*in_layer + 1) as f64 > config.layer_limit * layer_size {
            continue;
        }
        if let Layer::FullyConnected(fc) = &mut network.layers_mut()[candidate.layer_id] {
            delete_row(fc, candidate.neuron)?;
        }
        *in_layer += 1;
        debug!(
            "deleted neuron {} of layer {} (score {:.6})",
            candidate.neuron, candidate.layer_id, candidate.score
        );
        report.deleted.push(candidate);
    }

    info!(
        "simple neuron deleter: removed {} of {} neurons (p={}, layer_limit={})",
        report.deleted.len(),
        report.considered(),
        config.p,
        config.layer_limit
    );
    Ok(report)
}

/// Per layer, one score per neuron of the layer input: the largest absolute
/// derivative bound over all network outputs.
///
/// `scores[i][j]` is neuron `j` (flat index over the non-batch axes) of the
/// input of layer `i`.
pub fn derest_significance(result: &DerestResult<BoundedTensor>) -> Result<Vec<Vec<NeuronScore>>> {
    result
        .derivatives
        .iter()
        .enumerate()
        .map(|(layer_id, derivative)| {
            let shape = derivative.shape();
            let (rows, per_row) = match shape {
                [] => (1, 1),
                [n] => (1, *n),
                [rows, rest @ ..] => (*rows, rest.iter().product()),
            };
            let magnitude = derivative
                .lower
                .mapv(f64::abs)
                .into_iter()
                .zip(derivative.upper.mapv(f64::abs))
                .map(|(l, u)| l.max(u))
                .collect::<Vec<f64>>();
            let per_row_max = Array2::from_shape_vec((rows, per_row), magnitude)
                .map_err(|e| DerestError::invalid_parameter(e.to_string()))?
                .fold_axis(Axis(0), 0.0_f64, |acc, &v| acc.max(v));
            Ok(per_row_max
                .iter()
                .enumerate()
                .map(|(neuron, &score)| NeuronScore {
                    score,
                    neuron,
                    layer_id,
                })
                .collect())
        })
        .collect()
}

/// The `count` lowest scores, ascending.
pub fn least_significant(scores: &[NeuronScore], count: usize) -> Vec<NeuronScore> {
    let mut sorted = scores.to_vec();
    sorted.sort_by(NeuronScore::cmp_key);
    sorted.truncate(count);
    sorted
}
