//! The derest orchestrator: one forward and one backward pass over a layer
//! sequence.

use crate::layers::{DerestLayer, Layer};
use crate::types::DerestConfig;
use derest_core::{DerestError, Fill, Result};
use derest_tensor::{Bindings, BoundedTensor, Interval};
use tracing::{debug, info, warn};

/// An ordered sequence of layers.
#[derive(Debug, Clone, Default)]
pub struct Network {
    layers: Vec<Layer>,
}

/// Bounds produced by one derest run.
#[derive(Debug, Clone)]
pub struct DerestResult<I> {
    /// `activations[i]` bounds the input of layer `i`.
    pub activations: Vec<I>,
    /// Bounds on the network output.
    pub output: I,
    /// `derivatives[i]` bounds the impact of layer `i`'s input on each
    /// network output, one batch row per output.
    pub derivatives: Vec<I>,
}

impl<I: Interval> DerestResult<I> {
    /// Materialize every bound, evaluating shared work once.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<DerestResult<BoundedTensor>> {
        let items: Vec<&I> = self
            .activations
            .iter()
            .chain(std::iter::once(&self.output))
            .chain(self.derivatives.iter())
            .collect();
        let mut values = I::eval_many(&items, bindings)?.into_iter();
        let activations: Vec<BoundedTensor> = values.by_ref().take(self.activations.len()).collect();
        let output = values
            .next()
            .ok_or_else(|| DerestError::invalid_parameter("evaluation lost the output bounds"))?;
        let derivatives: Vec<BoundedTensor> = values.collect();
        Ok(DerestResult {
            activations,
            output,
            derivatives,
        })
    }
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_layers(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    pub fn add_layer(&mut self, layer: impl Into<Layer>) {
        self.layers.push(layer.into());
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Forward pass. Returns the input of every layer and the network output.
    pub fn forward<I: Interval>(&self, input: &I, config: &DerestConfig) -> Result<(Vec<I>, I)> {
        let mut activations = Vec::with_capacity(self.layers.len());
        let mut current = input.clone();
        for (index, layer) in self.layers.iter().enumerate() {
            let next = layer
                .activation(&current)
                .map_err(|e| e.in_layer(index, layer.layer_type()))?;
            debug!(
                "forward layer {} ({}): {:?} -> {:?}",
                index,
                layer.layer_type(),
                current.shape(),
                next.shape()
            );
            check_finite(config, &next, index, layer, "activation");
            activations.push(std::mem::replace(&mut current, next));
        }
        Ok((activations, current))
    }

    /// Backward pass from `seed`, the impact of the network output.
    ///
    /// `activations` must be the layer inputs recorded by [`Network::forward`].
    /// Returns the impact of every layer's input, in layer order.
    pub fn backward<I: Interval>(
        &self,
        activations: &[I],
        seed: I,
        config: &DerestConfig,
    ) -> Result<Vec<I>> {
        if activations.len() != self.layers.len() {
            return Err(DerestError::invalid_parameter(format!(
                "backward pass needs {} recorded activations, got {}",
                self.layers.len(),
                activations.len()
            )));
        }
        let mut derivatives = Vec::with_capacity(self.layers.len());
        let mut current = seed;
        for (index, layer) in self.layers.iter().enumerate().rev() {
            let next = layer
                .derivative(&current, &activations[index])
                .map_err(|e| e.in_layer(index, layer.layer_type()))?;
            debug!(
                "backward layer {} ({}): {:?} -> {:?}",
                index,
                layer.layer_type(),
                current.shape(),
                next.shape()
            );
            check_finite(config, &next, index, layer, "derivative");
            derivatives.push(next.clone());
            current = next;
        }
        derivatives.reverse();
        Ok(derivatives)
    }

    /// Identity seed for the backward pass, one row per output neuron,
    /// shaped like the output with the batch axis replaced by the row axis.
    pub fn seed<I: Interval>(output_shape: &[usize]) -> Result<I> {
        let neuron_dims = match output_shape {
            [] => {
                return Err(DerestError::RankMismatch {
                    expected: 1,
                    got: Vec::new(),
                })
            }
            [n] => vec![*n],
            [_, rest @ ..] => rest.to_vec(),
        };
        let n_outputs: usize = neuron_dims.iter().product();
        let mut shape = vec![n_outputs];
        shape.extend(neuron_dims);
        I::derest_output(n_outputs).reshape(&shape)
    }

    /// Run both passes for a single input (batch 1).
    pub fn derest<I: Interval>(&self, input: &I, config: &DerestConfig) -> Result<DerestResult<I>> {
        let shape = input.shape();
        if shape.len() > 1 && shape[0] != 1 {
            return Err(DerestError::invalid_parameter(format!(
                "derest runs on a single input, got batch {} in shape {:?}",
                shape[0], shape
            )));
        }
        info!(
            "derest: {} layers, input shape {:?}",
            self.layers.len(),
            shape
        );
        let (activations, output) = self.forward(input, config)?;
        let seed = Self::seed::<I>(&output.shape())?;
        let derivatives = self.backward(&activations, seed, config)?;
        Ok(DerestResult {
            activations,
            output,
            derivatives,
        })
    }

    /// Run [`Network::derest`] on an input of `shape` filled from the
    /// `fill` preset of `config.interval`.
    pub fn derest_preset<I: Interval>(
        &self,
        shape: &[usize],
        fill: Fill,
        config: &DerestConfig,
    ) -> Result<DerestResult<I>> {
        let input = I::from_shape(shape, fill, None, None, &config.interval)?;
        debug!("derest_preset: {:?} fill over {:?}", fill, shape);
        self.derest(&input, config)
    }
}

fn check_finite<I: Interval>(
    config: &DerestConfig,
    bounds: &I,
    index: usize,
    layer: &Layer,
    pass: &str,
) {
    if config.check_finite && bounds.all_finite() == Some(false) {
        warn!(
            "layer {} ({}) produced non-finite {} bounds",
            index,
            layer.layer_type(),
            pass
        );
    }
}

impl FromIterator<Layer> for Network {
    fn from_iter<T: IntoIterator<Item = Layer>>(iter: T) -> Self {
        Self::from_layers(iter.into_iter().collect())
    }
}
