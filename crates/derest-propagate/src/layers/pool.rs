use super::DerestLayer;
use derest_core::{PoolMode, PoolParams, Result};
use derest_tensor::Interval;

/// Max or average pooling over the two spatial axes.
#[derive(Debug, Clone)]
pub struct PoolLayer {
    pub params: PoolParams,
    pub mode: PoolMode,
}

impl PoolLayer {
    pub fn new(params: PoolParams, mode: PoolMode) -> Result<Self> {
        params.validate()?;
        Ok(Self { params, mode })
    }

    pub fn max(params: PoolParams) -> Result<Self> {
        Self::new(params, PoolMode::Max)
    }

    pub fn avg(params: PoolParams) -> Result<Self> {
        Self::new(params, PoolMode::Avg)
    }

    pub fn layer_type(&self) -> &'static str {
        match self.mode {
            PoolMode::Max => "MaxPool",
            PoolMode::Avg => "AvgPool",
        }
    }
}

impl DerestLayer for PoolLayer {
    fn activation<I: Interval>(&self, input: &I) -> Result<I> {
        input.op_pool(&self.params, self.mode)
    }

    fn derivative<I: Interval>(&self, output: &I, activation: &I) -> Result<I> {
        match self.mode {
            PoolMode::Max => output.op_d_max_pool(activation, &self.params),
            PoolMode::Avg => output.op_d_avg_pool(&activation.shape(), &self.params),
        }
    }
}
