use super::DerestLayer;
use derest_core::{DerestError, Result};
use derest_tensor::Interval;

/// Dropout at inference time: a scaling by the keep probability.
#[derive(Debug, Clone, Copy)]
pub struct DropoutLayer {
    p_dropout: f64,
}

impl DropoutLayer {
    pub fn new(p_dropout: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p_dropout) {
            return Err(DerestError::invalid_parameter(format!(
                "dropout probability must lie in [0, 1], got {p_dropout}"
            )));
        }
        Ok(Self { p_dropout })
    }

    pub fn p_dropout(&self) -> f64 {
        self.p_dropout
    }

    fn keep(&self) -> f64 {
        1.0 - self.p_dropout
    }
}

impl DerestLayer for DropoutLayer {
    fn activation<I: Interval>(&self, input: &I) -> Result<I> {
        Ok(input.scale(self.keep()))
    }

    fn derivative<I: Interval>(&self, output: &I, _activation: &I) -> Result<I> {
        Ok(output.scale(self.keep()))
    }
}
