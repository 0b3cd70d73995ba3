use super::DerestLayer;
use derest_core::{shape_mismatch_err, DerestError, Result};
use derest_tensor::Interval;
use ndarray::{Array1, Array2};

/// Dense layer `y = x · W + b` with `W` of shape `(n_in, n_out)`.
///
/// Rows of `W` are the outgoing weights of input neurons, which is what the
/// pruning glue zeroes.
#[derive(Debug, Clone)]
pub struct FullyConnectedLayer {
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
}

impl FullyConnectedLayer {
    pub fn new(weights: Array2<f64>, biases: Array1<f64>) -> Result<Self> {
        let n_out = weights.ncols();
        if biases.len() != n_out {
            return Err(shape_mismatch_err!(vec![n_out], vec![biases.len()]));
        }
        Ok(Self { weights, biases })
    }

    /// Layer without biases.
    pub fn from_weights(weights: Array2<f64>) -> Self {
        let biases = Array1::zeros(weights.ncols());
        Self { weights, biases }
    }

    pub fn n_in(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_out(&self) -> usize {
        self.weights.ncols()
    }

    /// Shape of the input seen as rows of `n_in` features.
    fn flat_shape(&self, shape: &[usize]) -> Result<Vec<usize>> {
        let flat = match shape {
            [] => {
                return Err(DerestError::RankMismatch {
                    expected: 1,
                    got: shape.to_vec(),
                })
            }
            [n] => vec![*n],
            [batch, rest @ ..] => vec![*batch, rest.iter().product()],
        };
        let features = flat[flat.len() - 1];
        if features != self.n_in() {
            let mut expected = flat.clone();
            let last = expected.len() - 1;
            expected[last] = self.n_in();
            return Err(shape_mismatch_err!(expected, flat));
        }
        Ok(flat)
    }
}

impl DerestLayer for FullyConnectedLayer {
    fn activation<I: Interval>(&self, input: &I) -> Result<I> {
        let flat = self.flat_shape(&input.shape())?;
        input
            .reshape(&flat)?
            .dot(&self.weights)?
            .add_array(&self.biases.clone().into_dyn())
    }

    fn derivative<I: Interval>(&self, output: &I, activation: &I) -> Result<I> {
        let act_shape = activation.shape();
        self.flat_shape(&act_shape)?;
        let out_shape = output.shape();
        let rows = if out_shape.len() >= 2 { out_shape[0] } else { 1 };
        let transposed = self.weights.t().to_owned();
        let din = output.dot(&transposed)?;
        let mut shape = vec![rows];
        if act_shape.len() >= 2 {
            shape.extend_from_slice(&act_shape[1..]);
        } else {
            shape.extend_from_slice(&act_shape);
        }
        din.reshape(&shape)
    }
}
