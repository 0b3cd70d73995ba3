//! Layer descriptors and their bound-propagation rules.
//!
//! Every layer kind has an activation rule (forward) and a derivative rule
//! (backward). Both are generic over [`Interval`], so one rule serves the
//! eager and the deferred realization.

mod conv;
mod dropout;
mod fully_connected;
mod norm;
mod pool;
mod relu;
mod softmax;

pub use conv::ConvolutionalLayer;
pub use dropout::DropoutLayer;
pub use fully_connected::FullyConnectedLayer;
pub use norm::NormLayer;
pub use pool::PoolLayer;
pub use relu::{a_relu, ReluLayer};
pub use softmax::SoftmaxLayer;

use derest_core::Result;
use derest_tensor::Interval;

/// Forward and backward interval rules of one layer.
pub trait DerestLayer {
    /// Bounds on the layer output given bounds on its input.
    fn activation<I: Interval>(&self, input: &I) -> Result<I>;

    /// Bounds on the impact of the layer input on the network output.
    ///
    /// `output` is the impact of this layer's output, one batch row per
    /// network output; `activation` is the layer input recorded during the
    /// forward pass.
    fn derivative<I: Interval>(&self, output: &I, activation: &I) -> Result<I>;
}

/// A network layer.
#[derive(Debug, Clone)]
pub enum Layer {
    FullyConnected(FullyConnectedLayer),
    Convolutional(ConvolutionalLayer),
    Pool(PoolLayer),
    Relu(ReluLayer),
    Dropout(DropoutLayer),
    Softmax(SoftmaxLayer),
    Norm(NormLayer),
}

impl Layer {
    pub fn layer_type(&self) -> &'static str {
        match self {
            Layer::FullyConnected(_) => "FullyConnected",
            Layer::Convolutional(_) => "Convolutional",
            Layer::Pool(l) => l.layer_type(),
            Layer::Relu(_) => "ReLU",
            Layer::Dropout(_) => "Dropout",
            Layer::Softmax(_) => "Softmax",
            Layer::Norm(_) => "LRN",
        }
    }

    /// Whether the layer carries trainable weights.
    pub fn is_weighted(&self) -> bool {
        matches!(self, Layer::FullyConnected(_) | Layer::Convolutional(_))
    }
}

impl DerestLayer for Layer {
    fn activation<I: Interval>(&self, input: &I) -> Result<I> {
        match self {
            Layer::FullyConnected(l) => l.activation(input),
            Layer::Convolutional(l) => l.activation(input),
            Layer::Pool(l) => l.activation(input),
            Layer::Relu(l) => l.activation(input),
            Layer::Dropout(l) => l.activation(input),
            Layer::Softmax(l) => l.activation(input),
            Layer::Norm(l) => l.activation(input),
        }
    }

    fn derivative<I: Interval>(&self, output: &I, activation: &I) -> Result<I> {
        match self {
            Layer::FullyConnected(l) => l.derivative(output, activation),
            Layer::Convolutional(l) => l.derivative(output, activation),
            Layer::Pool(l) => l.derivative(output, activation),
            Layer::Relu(l) => l.derivative(output, activation),
            Layer::Dropout(l) => l.derivative(output, activation),
            Layer::Softmax(l) => l.derivative(output, activation),
            Layer::Norm(l) => l.derivative(output, activation),
        }
    }
}

impl From<FullyConnectedLayer> for Layer {
    fn from(layer: FullyConnectedLayer) -> Self {
        Layer::FullyConnected(layer)
    }
}

impl From<ConvolutionalLayer> for Layer {
    fn from(layer: ConvolutionalLayer) -> Self {
        Layer::Convolutional(layer)
    }
}

impl From<PoolLayer> for Layer {
    fn from(layer: PoolLayer) -> Self {
        Layer::Pool(layer)
    }
}

impl From<ReluLayer> for Layer {
    fn from(layer: ReluLayer) -> Self {
        Layer::Relu(layer)
    }
}

impl From<DropoutLayer> for Layer {
    fn from(layer: DropoutLayer) -> Self {
        Layer::Dropout(layer)
    }
}

impl From<SoftmaxLayer> for Layer {
    fn from(layer: SoftmaxLayer) -> Self {
        Layer::Softmax(layer)
    }
}

impl From<NormLayer> for Layer {
    fn from(layer: NormLayer) -> Self {
        Layer::Norm(layer)
    }
}
