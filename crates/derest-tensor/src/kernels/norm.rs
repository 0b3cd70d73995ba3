//! Local response normalization across channels.
//!
//! For a value `y` whose neighbours contribute `c = k + a * sum(x_j^2)`, the
//! layer outputs `y / (c + a * y^2)^beta` with `a = alpha / local_range`.
//!
//! Every bound here is the range of a smooth function over a box, found by
//! evaluating the function at a finite set of candidates: the box corners
//! and the points on its edges and faces where a partial derivative
//! vanishes. Candidates outside the box are dropped, and NaN values are
//! ignored by the fold.

use super::{act_batch, as_rank4, check_act_batches};
use crate::BoundedTensor;
use derest_core::{Bound, DerestError, LrnParams, Result};
use ndarray::{Array4, ArrayView4};

/// The normalization function and its partial derivatives for one
/// parameter set.
#[derive(Debug, Clone, Copy)]
struct Lrn {
    k: f64,
    a: f64,
    beta: f64,
}

impl Lrn {
    fn new(params: &LrnParams) -> Self {
        Self {
            k: params.k,
            a: params.alpha_per_term(),
            beta: params.beta,
        }
    }

    fn value(&self, x: f64, c: f64) -> f64 {
        x / (c + self.a * x * x).powf(self.beta)
    }

    /// Derivative of `value(x, c)` in `x`.
    fn self_derivative(&self, x: f64, c: f64) -> f64 {
        let x2 = x * x;
        (self.a * (1.0 - 2.0 * self.beta) * x2 + c) / (self.a * x2 + c).powf(self.beta + 1.0)
    }

    /// Derivative of the output at `y` in the neighbour `x`, every other
    /// neighbour folded into `c`.
    fn cross_derivative(&self, x: f64, y: f64, c: f64) -> f64 {
        -2.0 * self.a * self.beta * x * y / (c + self.a * (x * x + y * y)).powf(self.beta + 1.0)
    }

    fn value_candidates(&self, x: Bound, c: Bound) -> Vec<(f64, f64)> {
        let mut points = corners2(x, c);
        // d/dx = 0 along the c edges
        for cv in [c.lower, c.upper] {
            let root = (cv / ((2.0 * self.beta - 1.0) * self.a)).sqrt();
            points.extend(
                [0.0, root, -root]
                    .into_iter()
                    .filter(|&xv| x.contains(xv))
                    .map(|xv| (xv, cv)),
            );
        }
        // d/dc = 0 along the x edges
        for xv in [x.lower, x.upper] {
            let cv = xv * xv * (2.0 * self.beta - 1.0) * self.a;
            if c.contains(cv) {
                points.push((xv, cv));
            }
        }
        points
    }

    fn self_derivative_candidates(&self, x: Bound, c: Bound) -> Vec<(f64, f64)> {
        let mut points = corners2(x, c);
        for cv in [c.lower, c.upper] {
            let root = (3.0 * cv).sqrt() / (self.a * (2.0 * self.beta - 1.0)).sqrt();
            points.extend(
                [0.0, -root, root]
                    .into_iter()
                    .filter(|&xv| x.contains(xv))
                    .map(|xv| (xv, cv)),
            );
        }
        for xv in [x.lower, x.upper] {
            let cv = self.a * (2.0 * self.beta + 1.0) * xv * xv;
            if c.contains(cv) {
                points.push((xv, cv));
            }
        }
        points
    }

    fn cross_derivative_candidates(&self, x: Bound, y: Bound, c: Bound) -> Vec<(f64, f64, f64)> {
        let (a, b) = (self.a, self.beta);
        let mut points = Vec::with_capacity(24);
        for xv in [x.lower, x.upper] {
            for yv in [y.lower, y.upper] {
                for cv in [c.lower, c.upper] {
                    points.push((xv, yv, cv));
                }
            }
        }
        // stationary in x on the (y, c) edges, and symmetrically in y
        for other in [y.lower, y.upper] {
            for cv in [c.lower, c.upper] {
                let root = ((cv + a * other * other) / (a * (2.0 * b + 1.0))).sqrt();
                points.extend(
                    [root, -root]
                        .into_iter()
                        .filter(|&xv| x.contains(xv))
                        .map(|xv| (xv, other, cv)),
                );
            }
        }
        for other in [x.lower, x.upper] {
            for cv in [c.lower, c.upper] {
                let root = ((cv + a * other * other) / (a * (2.0 * b + 1.0))).sqrt();
                points.extend(
                    [root, -root]
                        .into_iter()
                        .filter(|&yv| y.contains(yv))
                        .map(|yv| (other, yv, cv)),
                );
            }
        }
        // stationary in both x and y on the c faces
        for cv in [c.lower, c.upper] {
            let root = (cv / (2.0 * a * b)).sqrt();
            for xv in [-root, root] {
                for yv in [-root, root] {
                    if x.contains(xv) && y.contains(yv) {
                        points.push((xv, yv, cv));
                    }
                }
            }
        }
        points
    }

    fn value_range(&self, x: Bound, c: Bound) -> Bound {
        enclose(self.value_candidates(x, c).into_iter().map(|(xv, cv)| self.value(xv, cv)))
    }

    fn self_derivative_range(&self, x: Bound, c: Bound) -> Bound {
        enclose(
            self.self_derivative_candidates(x, c)
                .into_iter()
                .map(|(xv, cv)| self.self_derivative(xv, cv)),
        )
    }

    fn cross_derivative_range(&self, x: Bound, y: Bound, c: Bound) -> Bound {
        enclose(
            self.cross_derivative_candidates(x, y, c)
                .into_iter()
                .map(|(xv, yv, cv)| self.cross_derivative(xv, yv, cv)),
        )
    }
}

fn corners2(x: Bound, c: Bound) -> Vec<(f64, f64)> {
    vec![
        (x.lower, c.lower),
        (x.lower, c.upper),
        (x.upper, c.lower),
        (x.upper, c.upper),
    ]
}

/// Smallest bound holding every non-NaN value.
fn enclose(values: impl Iterator<Item = f64>) -> Bound {
    values.fold(Bound::empty(), |acc, v| acc.include(v))
}

fn bound_at(lower: &ArrayView4<f64>, upper: &ArrayView4<f64>, idx: [usize; 4]) -> Bound {
    Bound {
        lower: lower[idx],
        upper: upper[idx],
    }
}

fn square(b: Bound) -> Bound {
    let (l2, u2) = (b.lower * b.lower, b.upper * b.upper);
    if b.lower <= 0.0 && b.upper >= 0.0 {
        Bound { lower: 0.0, upper: l2.max(u2) }
    } else {
        Bound { lower: l2.min(u2), upper: l2.max(u2) }
    }
}

/// `a * (sum of squared neighbours of channel ch)` at one position.
fn neighbour_sum(
    params: &LrnParams,
    a: f64,
    lo: &ArrayView4<f64>,
    hi: &ArrayView4<f64>,
    (b, ch, y, x): (usize, usize, usize, usize),
) -> Bound {
    let channels = lo.dim().1 as isize;
    params
        .neighbour_offsets()
        .map(|off| ch as isize + off)
        .filter(|&j| 0 <= j && j < channels)
        .map(|j| square(bound_at(lo, hi, [b, j as usize, y, x])).scale(a))
        .fold(Bound::concrete(0.0), |acc, v| acc + v)
}

/// Interval LRN over `(batch, channels, height, width)`.
pub fn norm_forward(input: &BoundedTensor, params: &LrnParams) -> Result<BoundedTensor> {
    params.validate()?;
    let lo = as_rank4(&input.lower)?;
    let hi = as_rank4(&input.upper)?;
    let lrn = Lrn::new(params);
    let dims = lo.dim();
    let mut lower = Array4::zeros(dims);
    let mut upper = Array4::zeros(dims);

    for ((b, ch, y, x), out) in lower.indexed_iter_mut() {
        let c = neighbour_sum(params, lrn.a, &lo, &hi, (b, ch, y, x)) + Bound::concrete(lrn.k);
        let range = lrn.value_range(bound_at(&lo, &hi, [b, ch, y, x]), c);
        *out = range.lower;
        upper[[b, ch, y, x]] = range.upper;
    }
    Ok(BoundedTensor::new_unchecked(lower.into_dyn(), upper.into_dyn()))
}

/// Pull `dout` back through an LRN layer whose input was `activation`.
///
/// Each output depends on its own channel and on its neighbours, so every
/// position contributes to the derivative of its own channel and of each
/// neighbouring channel.
pub fn norm_backward(dout: &BoundedTensor, activation: &BoundedTensor, params: &LrnParams) -> Result<BoundedTensor> {
    params.validate()?;
    let act_lo = as_rank4(&activation.lower)?;
    let act_hi = as_rank4(&activation.upper)?;
    let dl = as_rank4(&dout.lower)?;
    let du = as_rank4(&dout.upper)?;
    let (batch, channels, height, width) = dl.dim();
    let (act_batches, act_channels, act_height, act_width) = act_lo.dim();
    if (act_channels, act_height, act_width) != (channels, height, width) {
        return Err(DerestError::shape_mismatch(
            vec![act_batches, channels, height, width],
            activation.shape().to_vec(),
        ));
    }
    check_act_batches(activation.shape(), batch)?;
    let lrn = Lrn::new(params);

    let mut lower = Array4::zeros((batch, channels, height, width));
    let mut upper = Array4::zeros((batch, channels, height, width));
    for b in 0..batch {
        let ab = act_batch(act_batches, b);
        for ch in 0..channels {
            for y in 0..height {
                for x in 0..width {
                    let d = bound_at(&dl, &du, [b, ch, y, x]);
                    let others = neighbour_sum(params, lrn.a, &act_lo, &act_hi, (ab, ch, y, x));
                    let c = others + Bound::concrete(lrn.k);
                    let own = bound_at(&act_lo, &act_hi, [ab, ch, y, x]);

                    let term = lrn.self_derivative_range(own, c) * d;
                    lower[[b, ch, y, x]] += term.lower;
                    upper[[b, ch, y, x]] += term.upper;

                    for j in params
                        .neighbour_offsets()
                        .map(|off| ch as isize + off)
                        .filter(|&j| 0 <= j && j < channels as isize)
                        .map(|j| j as usize)
                    {
                        let neighbour = bound_at(&act_lo, &act_hi, [ab, j, y, x]);
                        let rest = c.antiadd(&square(neighbour).scale(lrn.a));
                        let term = lrn.cross_derivative_range(neighbour, own, rest) * d;
                        lower[[b, j, y, x]] += term.lower;
                        upper[[b, j, y, x]] += term.upper;
                    }
                }
            }
        }
    }
    Ok(BoundedTensor::new_unchecked(lower.into_dyn(), upper.into_dyn()))
}
