//! Grouped 2-D convolution over intervals, forward and transposed.
//!
//! Weights follow cross-correlation order: output `(oy, ox)` of channel `o`
//! sums `input[c, oy * sy - py + ky, ox * sx - px + kx] * weights[o, c, ky, kx]`
//! over the channels of `o`'s group. Padding cells are zero and receive no
//! gradient.

use super::{as_rank4, tap};
use crate::BoundedTensor;
use derest_core::params::window_count;
use derest_core::{DerestError, Result};
use ndarray::{s, Array1, Array4, ArrayView4};
use serde::{Deserialize, Serialize};

/// Static parameters of a convolutional layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvParams {
    /// `(out_channels, in_channels / n_groups, filter_height, filter_width)`.
    pub weights: Array4<f64>,
    pub biases: Option<Array1<f64>>,
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    /// Input and output channels are split into this many groups; a channel
    /// only sees channels of its own group.
    pub n_groups: usize,
}

impl ConvParams {
    pub fn new(weights: Array4<f64>) -> Self {
        Self {
            weights,
            biases: None,
            stride: (1, 1),
            padding: (0, 0),
            n_groups: 1,
        }
    }

    pub fn with_biases(mut self, biases: Array1<f64>) -> Self {
        self.biases = Some(biases);
        self
    }

    pub fn with_stride(mut self, stride: (usize, usize)) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: (usize, usize)) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_groups(mut self, n_groups: usize) -> Self {
        self.n_groups = n_groups;
        self
    }

    pub fn out_channels(&self) -> usize {
        self.weights.dim().0
    }

    pub fn in_channels(&self) -> usize {
        self.weights.dim().1 * self.n_groups
    }

    pub fn filter_dims(&self) -> (usize, usize) {
        let (_, _, fh, fw) = self.weights.dim();
        (fh, fw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_groups == 0 || self.out_channels() % self.n_groups != 0 {
            return Err(DerestError::invalid_parameter(format!(
                "{} output channels cannot be split into {} groups",
                self.out_channels(),
                self.n_groups
            )));
        }
        if self.stride.0 == 0 || self.stride.1 == 0 {
            return Err(DerestError::invalid_parameter(format!(
                "stride must be positive, got {:?}",
                self.stride
            )));
        }
        if let Some(biases) = &self.biases {
            if biases.len() != self.out_channels() {
                return Err(DerestError::shape_mismatch(
                    vec![self.out_channels()],
                    vec![biases.len()],
                ));
            }
        }
        Ok(())
    }

    /// Shape of the convolution output for an input of `input_shape`.
    pub fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        self.validate()?;
        let &[batch, channels, height, width] = input_shape else {
            return Err(DerestError::RankMismatch {
                expected: 4,
                got: input_shape.to_vec(),
            });
        };
        if channels != self.in_channels() {
            return Err(DerestError::shape_mismatch(
                vec![batch, self.in_channels(), height, width],
                input_shape.to_vec(),
            ));
        }
        let (fh, fw) = self.filter_dims();
        let oh = window_count(height, fh, self.stride.0, self.padding.0);
        let ow = window_count(width, fw, self.stride.1, self.padding.1);
        match (oh, ow) {
            (Some(oh), Some(ow)) => Ok(vec![batch, self.out_channels(), oh, ow]),
            _ => Err(DerestError::invalid_parameter(format!(
                "filter {fh}x{fw} with padding {:?} does not fit input {height}x{width}",
                self.padding
            ))),
        }
    }

    /// Weights split by sign: `(max(w, 0), min(w, 0))`.
    fn split_weights(&self) -> (Array4<f64>, Array4<f64>) {
        (
            self.weights.mapv(|w| w.max(0.0)),
            self.weights.mapv(|w| w.min(0.0)),
        )
    }
}

fn correlate(
    input: ArrayView4<f64>,
    weights: &Array4<f64>,
    conv: &ConvParams,
    out_dims: (usize, usize),
) -> Array4<f64> {
    let (batch, _, height, width) = input.dim();
    let (out_channels, group_channels, fh, fw) = weights.dim();
    let group_outputs = out_channels / conv.n_groups;
    let (oh, ow) = out_dims;
    let mut out = Array4::zeros((batch, out_channels, oh, ow));

    for b in 0..batch {
        for o in 0..out_channels {
            let first_channel = (o / group_outputs) * group_channels;
            for oy in 0..oh {
                for ox in 0..ow {
                    let mut acc = 0.0;
                    for c in 0..group_channels {
                        for ky in 0..fh {
                            let Some(iy) = tap(oy, ky, conv.stride.0, conv.padding.0, height)
                            else {
                                continue;
                            };
                            for kx in 0..fw {
                                if let Some(ix) = tap(ox, kx, conv.stride.1, conv.padding.1, width)
                                {
                                    acc += input[[b, first_channel + c, iy, ix]]
                                        * weights[[o, c, ky, kx]];
                                }
                            }
                        }
                    }
                    out[[b, o, oy, ox]] = acc;
                }
            }
        }
    }
    out
}

fn correlate_transpose(
    dout: ArrayView4<f64>,
    weights: &Array4<f64>,
    conv: &ConvParams,
    in_dims: (usize, usize, usize),
) -> Array4<f64> {
    let (batch, out_channels, oh, ow) = dout.dim();
    let (_, group_channels, fh, fw) = weights.dim();
    let group_outputs = out_channels / conv.n_groups;
    let (channels, height, width) = in_dims;
    let mut din = Array4::zeros((batch, channels, height, width));

    for b in 0..batch {
        for o in 0..out_channels {
            let first_channel = (o / group_outputs) * group_channels;
            for oy in 0..oh {
                for ox in 0..ow {
                    let d = dout[[b, o, oy, ox]];
                    for c in 0..group_channels {
                        for ky in 0..fh {
                            let Some(iy) = tap(oy, ky, conv.stride.0, conv.padding.0, height)
                            else {
                                continue;
                            };
                            for kx in 0..fw {
                                if let Some(ix) = tap(ox, kx, conv.stride.1, conv.padding.1, width)
                                {
                                    din[[b, first_channel + c, iy, ix]] +=
                                        d * weights[[o, c, ky, kx]];
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    din
}

/// Interval convolution. Positive weights carry lower to lower, negative
/// weights carry upper to lower.
pub fn conv_forward(input: &BoundedTensor, conv: &ConvParams) -> Result<BoundedTensor> {
    let out_shape = conv.output_shape(input.shape())?;
    let lo = as_rank4(&input.lower)?;
    let hi = as_rank4(&input.upper)?;
    let (w_pos, w_neg) = conv.split_weights();
    let out_dims = (out_shape[2], out_shape[3]);

    let mut lower = correlate(lo, &w_pos, conv, out_dims) + correlate(hi, &w_neg, conv, out_dims);
    let mut upper = correlate(hi, &w_pos, conv, out_dims) + correlate(lo, &w_neg, conv, out_dims);
    if let Some(biases) = &conv.biases {
        for (o, &bias) in biases.iter().enumerate() {
            let mut l = lower.slice_mut(s![.., o, .., ..]);
            l += bias;
            let mut u = upper.slice_mut(s![.., o, .., ..]);
            u += bias;
        }
    }
    Ok(BoundedTensor::new_unchecked(lower.into_dyn(), upper.into_dyn()))
}

/// Pull `dout` back through a convolution whose input had `input_shape`.
///
/// Only the non-batch axes of `input_shape` are used; the batch of the
/// result follows `dout`.
pub fn conv_backward(
    dout: &BoundedTensor,
    input_shape: &[usize],
    conv: &ConvParams,
) -> Result<BoundedTensor> {
    let expected = conv.output_shape(input_shape)?;
    let dout_shape = dout.shape();
    if dout_shape.len() != 4 || dout_shape[1..] != expected[1..] {
        let mut want = expected.clone();
        want[0] = dout_shape.first().copied().unwrap_or(0);
        return Err(DerestError::shape_mismatch(want, dout_shape.to_vec()));
    }
    let in_dims = (input_shape[1], input_shape[2], input_shape[3]);
    let dl = as_rank4(&dout.lower)?;
    let du = as_rank4(&dout.upper)?;
    let (w_pos, w_neg) = conv.split_weights();

    let lower = correlate_transpose(dl, &w_pos, conv, in_dims)
        + correlate_transpose(du, &w_neg, conv, in_dims);
    let upper = correlate_transpose(du, &w_pos, conv, in_dims)
        + correlate_transpose(dl, &w_neg, conv, in_dims);
    Ok(BoundedTensor::new_unchecked(lower.into_dyn(), upper.into_dyn()))
}
