use super::DerestLayer;
use derest_core::Result;
use derest_tensor::Interval;

/// Softmax over the last axis.
///
/// The derivative passes the incoming impact through unchanged: the output
/// layer's impact on itself is what the backward pass is seeded with.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftmaxLayer;

impl DerestLayer for SoftmaxLayer {
    fn activation<I: Interval>(&self, input: &I) -> Result<I> {
        input.op_softmax()
    }

    fn derivative<I: Interval>(&self, output: &I, _activation: &I) -> Result<I> {
        Ok(output.clone())
    }
}
