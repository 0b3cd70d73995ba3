use super::DerestLayer;
use derest_core::{LrnParams, Result};
use derest_tensor::Interval;

/// Local response normalization across channels.
#[derive(Debug, Clone, Copy)]
pub struct NormLayer {
    pub params: LrnParams,
}

impl NormLayer {
    pub fn new(params: LrnParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }
}

impl Default for NormLayer {
    fn default() -> Self {
        Self {
            params: LrnParams::default(),
        }
    }
}

impl DerestLayer for NormLayer {
    fn activation<I: Interval>(&self, input: &I) -> Result<I> {
        input.op_norm(&self.params)
    }

    fn derivative<I: Interval>(&self, output: &I, activation: &I) -> Result<I> {
        output.op_d_norm(activation, &self.params)
    }
}
