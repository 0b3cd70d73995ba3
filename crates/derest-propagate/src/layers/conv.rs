use super::DerestLayer;
use derest_core::Result;
use derest_tensor::{ConvParams, Interval};
use ndarray::{Array1, Array4};

/// 2-D convolution over `(batch, channels, height, width)` inputs.
#[derive(Debug, Clone)]
pub struct ConvolutionalLayer {
    pub params: ConvParams,
}

impl ConvolutionalLayer {
    pub fn new(params: ConvParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Unit stride, no padding, one group.
    pub fn from_weights(weights: Array4<f64>, biases: Array1<f64>) -> Result<Self> {
        Self::new(ConvParams::new(weights).with_biases(biases))
    }
}

impl DerestLayer for ConvolutionalLayer {
    fn activation<I: Interval>(&self, input: &I) -> Result<I> {
        input.op_conv(&self.params)
    }

    fn derivative<I: Interval>(&self, output: &I, activation: &I) -> Result<I> {
        output.op_d_conv(&activation.shape(), &self.params)
    }
}
