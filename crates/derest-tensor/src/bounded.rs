//! Eager interval tensors.

use crate::broadcast::{broadcast_shapes, view_as};
use crate::interval::Interval;
use crate::kernels::{self, ConvParams};
use crate::Bindings;
use derest_core::{
    shape_mismatch_err, Bound, DerestError, Exponent, Fill, IntervalConfig, LrnParams, PoolMode,
    PoolParams, Result,
};
use ndarray::{Array1, Array2, ArrayD, Axis, Dimension, Ix1, Ix2, IxDyn, Zip};
use serde::{Deserialize, Serialize};

/// A tensor of intervals held as two arrays of equal shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedTensor {
    pub lower: ArrayD<f64>,
    pub upper: ArrayD<f64>,
}

impl BoundedTensor {
    /// Create bounds, checking shapes and `lower <= upper` with the default
    /// tolerance.
    pub fn new(lower: ArrayD<f64>, upper: ArrayD<f64>) -> Result<Self> {
        Self::new_with_config(lower, upper, &IntervalConfig::default())
    }

    /// Create bounds, checking `lower <= upper` within `config.tolerance`.
    ///
    /// NaN entries are not violations: they come from unguarded arithmetic,
    /// such as dividing by an interval that contains zero.
    pub fn new_with_config(
        lower: ArrayD<f64>,
        upper: ArrayD<f64>,
        config: &IntervalConfig,
    ) -> Result<Self> {
        if lower.shape() != upper.shape() {
            return Err(shape_mismatch_err!(
                lower.shape().to_vec(),
                upper.shape().to_vec()
            ));
        }
        for ((index, &l), &u) in lower.indexed_iter().zip(upper.iter()) {
            if l - config.tolerance > u && !is_canonical_empty(l, u) {
                return Err(DerestError::InvalidInterval {
                    index: index.slice().to_vec(),
                    lower: l,
                    upper: u,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Create bounds produced by a sound operation, skipping the ordering check.
    pub fn new_unchecked(lower: ArrayD<f64>, upper: ArrayD<f64>) -> Self {
        debug_assert_eq!(lower.shape(), upper.shape());
        Self { lower, upper }
    }

    /// Point intervals.
    pub fn concrete(values: ArrayD<f64>) -> Self {
        Self {
            lower: values.clone(),
            upper: values,
        }
    }

    /// `[center - epsilon, center + epsilon]` elementwise.
    pub fn from_epsilon(center: ArrayD<f64>, epsilon: f64) -> Self {
        let epsilon = epsilon.abs();
        Self {
            lower: center.mapv(|v| v - epsilon),
            upper: center.mapv(|v| v + epsilon),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.lower.shape()
    }

    pub fn ndim(&self) -> usize {
        self.lower.ndim()
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// The bound at `index`, if it is in range.
    pub fn get(&self, index: &[usize]) -> Option<Bound> {
        Some(Bound {
            lower: *self.lower.get(IxDyn(index))?,
            upper: *self.upper.get(IxDyn(index))?,
        })
    }

    /// Overwrite the bound at `index`.
    pub fn set(&mut self, index: &[usize], bound: Bound) -> Result<()> {
        let (Some(l), Some(u)) = (
            self.lower.get_mut(IxDyn(index)),
            self.upper.get_mut(IxDyn(index)),
        ) else {
            return Err(DerestError::invalid_parameter(format!(
                "index {:?} out of range for shape {:?}",
                index,
                self.lower.shape()
            )));
        };
        *l = bound.lower;
        *u = bound.upper;
        Ok(())
    }

    /// Widths `upper - lower`.
    pub fn width(&self) -> ArrayD<f64> {
        &self.upper - &self.lower
    }

    /// Largest width, 0 for an empty tensor.
    pub fn max_width(&self) -> f64 {
        self.width().iter().copied().fold(0.0, f64::max)
    }

    /// Midpoints, when both bounds agree within `tolerance` everywhere.
    pub fn concretize(&self, tolerance: f64) -> Option<ArrayD<f64>> {
        (self.max_width() <= tolerance)
            .then(|| (&self.lower + &self.upper).mapv(|v| v * 0.5))
    }

    pub fn has_overflow(&self) -> bool {
        self.lower.iter().chain(self.upper.iter()).any(|v| !v.is_finite())
    }

    pub fn has_nan(&self) -> bool {
        self.lower.iter().chain(self.upper.iter()).any(|v| v.is_nan())
    }

    pub fn has_infinite(&self) -> bool {
        self.lower.iter().chain(self.upper.iter()).any(|v| v.is_infinite())
    }

    /// Whether every entry of `values` lies within its bound.
    pub fn contains(&self, values: &ArrayD<f64>) -> bool {
        values.shape() == self.shape()
            && Zip::from(&self.lower)
                .and(&self.upper)
                .and(values)
                .all(|&l, &u, &v| l <= v && v <= u)
    }

    /// Sub-tensor at position `index` of the first axis.
    pub fn index_axis0(&self, index: usize) -> Result<Self> {
        let len = self.shape().first().copied().unwrap_or(0);
        if index >= len {
            return Err(DerestError::invalid_parameter(format!(
                "index {index} out of range for axis 0 of length {len}"
            )));
        }
        Ok(Self {
            lower: self.lower.index_axis(Axis(0), index).to_owned(),
            upper: self.upper.index_axis(Axis(0), index).to_owned(),
        })
    }

    /// Overwrite position `index` of the first axis with `value`.
    pub fn assign_axis0(&mut self, index: usize, value: &BoundedTensor) -> Result<()> {
        let len = self.shape().first().copied().unwrap_or(0);
        if index >= len {
            return Err(DerestError::invalid_parameter(format!(
                "index {index} out of range for axis 0 of length {len}"
            )));
        }
        let expected = &self.shape()[1..];
        if value.shape() != expected {
            return Err(shape_mismatch_err!(
                expected.to_vec(),
                value.shape().to_vec()
            ));
        }
        self.lower.index_axis_mut(Axis(0), index).assign(&value.lower);
        self.upper.index_axis_mut(Axis(0), index).assign(&value.upper);
        Ok(())
    }

    /// Flatten to rank 1.
    pub fn flatten(&self) -> Self {
        Self {
            lower: Array1::from_iter(self.lower.iter().copied()).into_dyn(),
            upper: Array1::from_iter(self.upper.iter().copied()).into_dyn(),
        }
    }

    /// Iterate over the bounds in logical order.
    pub fn iter(&self) -> impl Iterator<Item = Bound> + '_ {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .map(|(&lower, &upper)| Bound { lower, upper })
    }

    /// Elementwise map of `(lower, upper)` to a new pair.
    fn map_bounds(&self, f: impl Fn(f64, f64) -> (f64, f64)) -> Self {
        let pairs = Zip::from(&self.lower)
            .and(&self.upper)
            .map_collect(|&l, &u| f(l, u));
        split(pairs)
    }

    /// Broadcast two interval tensors and combine them elementwise.
    fn zip_bounds(
        &self,
        other: &BoundedTensor,
        f: impl Fn(f64, f64, f64, f64) -> (f64, f64),
    ) -> Result<Self> {
        let shape = broadcast_shapes(self.shape(), other.shape())?;
        let (al, au) = (view_as(&self.lower, &shape)?, view_as(&self.upper, &shape)?);
        let (bl, bu) = (view_as(&other.lower, &shape)?, view_as(&other.upper, &shape)?);
        let pairs = Zip::from(&al)
            .and(&au)
            .and(&bl)
            .and(&bu)
            .map_collect(|&al, &au, &bl, &bu| f(al, au, bl, bu));
        Ok(split(pairs))
    }

    /// Broadcast against a plain array and combine elementwise.
    fn zip_array(&self, other: &ArrayD<f64>, f: impl Fn(f64, f64, f64) -> (f64, f64)) -> Result<Self> {
        let shape = broadcast_shapes(self.shape(), other.shape())?;
        let (l, u) = (view_as(&self.lower, &shape)?, view_as(&self.upper, &shape)?);
        let v = view_as(other, &shape)?;
        let pairs = Zip::from(&l)
            .and(&u)
            .and(&v)
            .map_collect(|&l, &u, &v| f(l, u, v));
        Ok(split(pairs))
    }
}

fn is_canonical_empty(lower: f64, upper: f64) -> bool {
    lower == f64::INFINITY && upper == f64::NEG_INFINITY
}

fn split(pairs: ArrayD<(f64, f64)>) -> BoundedTensor {
    BoundedTensor {
        lower: pairs.mapv(|(l, _)| l),
        upper: pairs.mapv(|(_, u)| u),
    }
}

fn min4(a: f64, b: f64, c: f64, d: f64) -> f64 {
    a.min(b).min(c.min(d))
}

fn max4(a: f64, b: f64, c: f64, d: f64) -> f64 {
    a.max(b).max(c.max(d))
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    (a.min(b), a.max(b))
}

/// Contains zero, endpoints included.
fn holds_zero(l: f64, u: f64) -> bool {
    l <= 0.0 && u >= 0.0
}

fn power_bounds(l: f64, u: f64, exponent: Exponent) -> (f64, f64) {
    match exponent {
        Exponent::Int(n) => {
            let (le, ue) = (l.powi(n), u.powi(n));
            match (n > 0, n % 2 == 0) {
                (true, true) if holds_zero(l, u) => (0.0, le.max(ue)),
                (true, true) => ordered(le, ue),
                (true, false) => (le, ue),
                (false, true) => ordered(le, ue),
                (false, false) => (ue, le),
            }
        }
        Exponent::Real(r) => {
            let (le, ue) = (l.powf(r), u.powf(r));
            if r > 0.0 {
                (le, ue)
            } else {
                (ue, le)
            }
        }
    }
}

impl Interval for BoundedTensor {
    fn from_arrays(
        lower: ArrayD<f64>,
        upper: ArrayD<f64>,
        config: &IntervalConfig,
    ) -> Result<Self> {
        Self::new_with_config(lower, upper, config)
    }

    fn from_shape(
        shape: &[usize],
        fill: Fill,
        lower: Option<f64>,
        upper: Option<f64>,
        config: &IntervalConfig,
    ) -> Result<Self> {
        let bound = config.resolve(fill, lower, upper)?;
        Ok(Self {
            lower: ArrayD::from_elem(IxDyn(shape), bound.lower),
            upper: ArrayD::from_elem(IxDyn(shape), bound.upper),
        })
    }

    fn derest_output(n_outputs: usize) -> Self {
        Self::concrete(Array2::eye(n_outputs).into_dyn())
    }

    fn shape(&self) -> Vec<usize> {
        BoundedTensor::shape(self).to_vec()
    }

    fn add(&self, other: &Self) -> Result<Self> {
        self.zip_bounds(other, |al, au, bl, bu| (al + bl, au + bu))
    }

    fn add_array(&self, other: &ArrayD<f64>) -> Result<Self> {
        self.zip_array(other, |l, u, v| (l + v, u + v))
    }

    fn add_scalar(&self, value: f64) -> Self {
        self.map_bounds(|l, u| (l + value, u + value))
    }

    fn sub(&self, other: &Self) -> Result<Self> {
        self.zip_bounds(other, |al, au, bl, bu| (al - bu, au - bl))
    }

    fn antiadd(&self, other: &Self) -> Result<Self> {
        self.zip_bounds(other, |al, au, bl, bu| (al - bl, au - bu))
    }

    fn mul(&self, other: &Self) -> Result<Self> {
        self.zip_bounds(other, |al, au, bl, bu| {
            let (ll, lu, ul, uu) = (al * bl, al * bu, au * bl, au * bu);
            (min4(ll, lu, ul, uu), max4(ll, lu, ul, uu))
        })
    }

    fn mul_array(&self, other: &ArrayD<f64>) -> Result<Self> {
        self.zip_array(other, |l, u, v| ordered(l * v, u * v))
    }

    fn scale(&self, factor: f64) -> Self {
        self.map_bounds(|l, u| ordered(l * factor, u * factor))
    }

    fn div(&self, other: &Self) -> Result<Self> {
        self.zip_bounds(other, |al, au, bl, bu| {
            let (ll, lu, ul, uu) = (al / bl, al / bu, au / bl, au / bu);
            (min4(ll, lu, ul, uu), max4(ll, lu, ul, uu))
        })
    }

    fn div_array(&self, other: &ArrayD<f64>) -> Result<Self> {
        self.zip_array(other, |l, u, v| ordered(l / v, u / v))
    }

    fn reciprocal(&self) -> Self {
        self.map_bounds(|l, u| ordered(1.0 / l, 1.0 / u))
    }

    fn neg(&self) -> Self {
        self.map_bounds(|l, u| (-u, -l))
    }

    fn exp(&self) -> Self {
        self.map_bounds(|l, u| (l.exp(), u.exp()))
    }

    fn square(&self) -> Self {
        self.map_bounds(|l, u| {
            let (l2, u2) = (l * l, u * u);
            if holds_zero(l, u) {
                (0.0, l2.max(u2))
            } else {
                ordered(l2, u2)
            }
        })
    }

    fn power(&self, exponent: Exponent) -> Self {
        self.map_bounds(|l, u| power_bounds(l, u, exponent))
    }

    fn dot(&self, weights: &Array2<f64>) -> Result<Self> {
        let (n_in, _) = weights.dim();
        let w_pos = weights.mapv(|w| w.max(0.0));
        let w_neg = weights.mapv(|w| w.min(0.0));
        match self.ndim() {
            1 => {
                let l = self.lower.view().into_dimensionality::<Ix1>().map_err(|_| rank_err(1, self))?;
                let u = self.upper.view().into_dimensionality::<Ix1>().map_err(|_| rank_err(1, self))?;
                if l.len() != n_in {
                    return Err(shape_mismatch_err!(vec![n_in], self.shape().to_vec()));
                }
                Ok(Self::new_unchecked(
                    (l.dot(&w_pos) + u.dot(&w_neg)).into_dyn(),
                    (u.dot(&w_pos) + l.dot(&w_neg)).into_dyn(),
                ))
            }
            2 => {
                let l = self.lower.view().into_dimensionality::<Ix2>().map_err(|_| rank_err(2, self))?;
                let u = self.upper.view().into_dimensionality::<Ix2>().map_err(|_| rank_err(2, self))?;
                if l.ncols() != n_in {
                    return Err(shape_mismatch_err!(
                        vec![l.nrows(), n_in],
                        self.shape().to_vec()
                    ));
                }
                Ok(Self::new_unchecked(
                    (l.dot(&w_pos) + u.dot(&w_neg)).into_dyn(),
                    (u.dot(&w_pos) + l.dot(&w_neg)).into_dyn(),
                ))
            }
            _ => Err(rank_err(2, self)),
        }
    }

    fn max(&self, other: &Self) -> Result<Self> {
        self.zip_bounds(other, |al, au, bl, bu| (al.max(bl), au.max(bu)))
    }

    fn max_scalar(&self, value: f64) -> Self {
        self.map_bounds(|l, u| (l.max(value), u.max(value)))
    }

    fn abs(&self) -> Self {
        self.map_bounds(|l, u| {
            let lower = if l > 0.0 {
                l
            } else if u < 0.0 {
                -u
            } else {
                0.0
            };
            (lower, (-l).max(u))
        })
    }

    fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let n: usize = shape.iter().product();
        if n != self.len() {
            return Err(shape_mismatch_err!(shape.to_vec(), self.shape().to_vec()));
        }
        let lower = self.lower.to_shape(IxDyn(shape)).map_err(|_| {
            DerestError::shape_mismatch(shape.to_vec(), self.shape().to_vec())
        })?;
        let upper = self.upper.to_shape(IxDyn(shape)).map_err(|_| {
            DerestError::shape_mismatch(shape.to_vec(), self.shape().to_vec())
        })?;
        Ok(Self::new_unchecked(lower.into_owned(), upper.into_owned()))
    }

    fn eval(&self, _bindings: &Bindings) -> Result<BoundedTensor> {
        Ok(self.clone())
    }

    fn all_finite(&self) -> Option<bool> {
        Some(!self.has_overflow())
    }

    fn op_relu(&self) -> Result<Self> {
        Ok(kernels::relu(self))
    }

    fn op_softmax(&self) -> Result<Self> {
        kernels::softmax(self)
    }

    fn op_norm(&self, params: &LrnParams) -> Result<Self> {
        kernels::norm_forward(self, params)
    }

    fn op_conv(&self, conv: &ConvParams) -> Result<Self> {
        kernels::conv_forward(self, conv)
    }

    fn op_pool(&self, pool: &PoolParams, mode: PoolMode) -> Result<Self> {
        kernels::pool_forward(self, pool, mode)
    }

    fn op_d_relu(&self, activation: &Self) -> Result<Self> {
        kernels::d_relu(self, activation)
    }

    fn op_d_max_pool(&self, activation: &Self, pool: &PoolParams) -> Result<Self> {
        kernels::max_pool_backward(self, activation, pool)
    }

    fn op_d_avg_pool(&self, input_shape: &[usize], pool: &PoolParams) -> Result<Self> {
        kernels::avg_pool_backward(self, input_shape, pool)
    }

    fn op_d_norm(&self, activation: &Self, params: &LrnParams) -> Result<Self> {
        kernels::norm_backward(self, activation, params)
    }

    fn op_d_conv(&self, input_shape: &[usize], conv: &ConvParams) -> Result<Self> {
        kernels::conv_backward(self, input_shape, conv)
    }
}

fn rank_err(expected: usize, tensor: &BoundedTensor) -> DerestError {
    DerestError::RankMismatch {
        expected,
        got: tensor.shape().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};

    fn itv(lower: &[f64], upper: &[f64]) -> BoundedTensor {
        BoundedTensor::new(arr1(lower).into_dyn(), arr1(upper).into_dyn()).unwrap()
    }

    fn pairs(t: &BoundedTensor) -> Vec<(f64, f64)> {
        t.iter().map(|b| (b.lower, b.upper)).collect()
    }

    #[test]
    fn test_new_rejects_inverted_bounds() {
        let err = BoundedTensor::new(arr1(&[0.0, 2.0]).into_dyn(), arr1(&[1.0, 1.0]).into_dyn())
            .unwrap_err();
        match err {
            DerestError::InvalidInterval { index, lower, upper } => {
                assert_eq!(index, vec![1]);
                assert_eq!((lower, upper), (2.0, 1.0));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_new_accepts_tolerance_and_empty_pair() {
        assert!(BoundedTensor::new(arr1(&[1.00005]).into_dyn(), arr1(&[1.0]).into_dyn()).is_ok());
        assert!(BoundedTensor::new(
            arr1(&[f64::INFINITY]).into_dyn(),
            arr1(&[f64::NEG_INFINITY]).into_dyn()
        )
        .is_ok());
    }

    #[test]
    fn test_new_rejects_shape_mismatch() {
        assert!(matches!(
            BoundedTensor::new(arr1(&[0.0]).into_dyn(), arr1(&[1.0, 2.0]).into_dyn()),
            Err(DerestError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_shape_presets() {
        let cfg = IntervalConfig::default();
        let n = BoundedTensor::from_shape(&[2, 2], Fill::Neutral, None, None, &cfg).unwrap();
        assert!(n.iter().all(|b| b == Bound::concrete(0.0)));
        let d = BoundedTensor::from_shape(&[3], Fill::Default, None, None, &cfg).unwrap();
        assert_eq!(pairs(&d), vec![(0.0, 255.0); 3]);
        let e = BoundedTensor::from_shape(&[1], Fill::Neutral, Some(-1.0), Some(4.0), &cfg).unwrap();
        assert_eq!(pairs(&e), vec![(-1.0, 4.0)]);
        let empty = BoundedTensor::from_shape(
            &[1],
            Fill::Neutral,
            Some(f64::INFINITY),
            Some(f64::NEG_INFINITY),
            &cfg,
        );
        assert!(empty.is_ok());
        assert!(BoundedTensor::from_shape(&[1], Fill::Neutral, Some(3.0), Some(1.0), &cfg).is_err());
    }

    #[test]
    fn test_derest_output_is_identity() {
        let seed = BoundedTensor::derest_output(3);
        assert_eq!(seed.shape(), &[3, 3]);
        assert_eq!(seed.lower, Array2::<f64>::eye(3).into_dyn());
        assert_eq!(seed.lower, seed.upper);
    }

    #[test]
    fn test_preset_fill_never_narrows() {
        let wide = IntervalConfig {
            neutral: Bound::new(-1e6, 1e6),
            ..IntervalConfig::default()
        };
        for cfg in [IntervalConfig::default(), wide] {
            for fill in [Fill::Neutral, Fill::Default] {
                let filled = BoundedTensor::from_shape(&[2, 3], fill, None, None, &cfg).unwrap();
                let same = [
                    filled.add_scalar(0.0),
                    filled.scale(1.0),
                    filled.max(&filled).unwrap(),
                    filled.mul_array(&ArrayD::ones(IxDyn(&[2, 3]))).unwrap(),
                ];
                for out in &same {
                    assert_eq!(out.shape(), filled.shape());
                    for (o, w) in out.iter().zip(filled.iter()) {
                        assert!(o.lower <= w.lower && o.upper >= w.upper, "{fill:?}");
                    }
                }
            }
        }
        let default = BoundedTensor::from_shape(&[4], Fill::Default, None, None, &IntervalConfig::default()).unwrap();
        assert_eq!(default.abs(), default);
        assert_eq!(default.max_scalar(0.0), default);
    }

    #[test]
    fn test_add_sub_antiadd() {
        let a = itv(&[1.0, -2.0], &[3.0, 0.0]);
        let b = itv(&[-1.0, 1.0], &[2.0, 5.0]);
        assert_eq!(pairs(&a.add(&b).unwrap()), vec![(0.0, 5.0), (-1.0, 5.0)]);
        assert_eq!(pairs(&a.sub(&b).unwrap()), vec![(-1.0, 4.0), (-7.0, -1.0)]);
        assert_eq!(a.add(&b).unwrap().antiadd(&b).unwrap(), a);
    }

    #[test]
    fn test_add_broadcasts_and_reports_mismatch() {
        let a = BoundedTensor::concrete(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn());
        let b = itv(&[10.0, 20.0], &[11.0, 21.0]);
        let c = a.add(&b).unwrap();
        assert_eq!(c.get(&[1, 1]), Some(Bound::new(24.0, 25.0)));
        let bad = itv(&[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]);
        assert!(matches!(a.add(&bad), Err(DerestError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_mul_corners() {
        let a = itv(&[-1.0, 2.0], &[2.0, 3.0]);
        let b = itv(&[-3.0, -1.0], &[4.0, 1.0]);
        assert_eq!(pairs(&a.mul(&b).unwrap()), vec![(-6.0, 8.0), (-3.0, 3.0)]);
    }

    #[test]
    fn test_mul_array_and_scale() {
        let a = itv(&[1.0, -2.0], &[2.0, 3.0]);
        let m = a.mul_array(&arr1(&[-2.0, 3.0]).into_dyn()).unwrap();
        assert_eq!(pairs(&m), vec![(-4.0, -2.0), (-6.0, 9.0)]);
        assert_eq!(pairs(&a.scale(-1.0)), vec![(-2.0, -1.0), (-3.0, 2.0)]);
    }

    #[test]
    fn test_div_and_reciprocal() {
        let a = itv(&[1.0], &[2.0]);
        let b = itv(&[4.0], &[8.0]);
        assert_eq!(pairs(&a.div(&b).unwrap()), vec![(0.125, 0.5)]);
        assert_eq!(pairs(&b.reciprocal()), vec![(0.125, 0.25)]);
        let q = a.div_array(&arr1(&[-2.0]).into_dyn()).unwrap();
        assert_eq!(pairs(&q), vec![(-1.0, -0.5)]);
    }

    #[test]
    fn test_div_by_zero_is_not_guarded() {
        let a = itv(&[1.0], &[2.0]);
        let z = itv(&[0.0], &[1.0]);
        let q = a.div(&z).unwrap();
        assert!(q.upper[[0]].is_infinite());
    }

    #[test]
    fn test_neg_exp() {
        let a = itv(&[-1.0, 0.0], &[2.0, 1.0]);
        assert_eq!(pairs(&a.neg()), vec![(-2.0, 1.0), (-1.0, 0.0)]);
        let e = a.exp();
        assert_eq!(e.lower[[1]], 1.0);
        assert_eq!(e.upper[[1]], 1.0_f64.exp());
    }

    #[test]
    fn test_square() {
        let a = itv(&[-2.0, 1.0, -3.0, 0.0], &[1.0, 2.0, -1.0, 2.0]);
        assert_eq!(
            pairs(&a.square()),
            vec![(0.0, 4.0), (1.0, 4.0), (1.0, 9.0), (0.0, 4.0)]
        );
    }

    #[test]
    fn test_power_integer_exponents() {
        let a = itv(&[-2.0, 1.0], &[1.0, 2.0]);
        assert_eq!(pairs(&a.power(Exponent::Int(2))), vec![(0.0, 4.0), (1.0, 4.0)]);
        assert_eq!(pairs(&a.power(Exponent::Int(3))), vec![(-8.0, 1.0), (1.0, 8.0)]);
        let p = itv(&[1.0], &[2.0]);
        assert_eq!(pairs(&p.power(Exponent::Int(-2))), vec![(0.25, 1.0)]);
        assert_eq!(pairs(&p.power(Exponent::Int(-1))), vec![(0.5, 1.0)]);
    }

    #[test]
    fn test_power_real_exponents() {
        let a = itv(&[4.0], &[9.0]);
        let r = a.power(Exponent::Real(0.5));
        assert_relative_eq!(r.lower[[0]], 2.0, epsilon = 1e-12);
        assert_relative_eq!(r.upper[[0]], 3.0, epsilon = 1e-12);
        let r = a.power(Exponent::Real(-0.5));
        assert_relative_eq!(r.lower[[0]], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(r.upper[[0]], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_dot_sign_split() {
        let x = itv(&[3.0, 6.0], &[3.0, 6.0]).reshape(&[1, 2]).unwrap();
        let w = arr2(&[[9.0, 15.0], [12.0, 18.0]]);
        assert_eq!(pairs(&x.dot(&w).unwrap()), vec![(117.0, 117.0), (144.0, 144.0)]);

        let y = itv(&[-1.0, 0.0], &[1.0, 2.0]);
        let v = arr2(&[[2.0], [-3.0]]);
        assert_eq!(pairs(&y.dot(&v).unwrap()), vec![(-8.0, 2.0)]);
    }

    #[test]
    fn test_dot_rejects_wrong_inner_dim() {
        let x = itv(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!(x.dot(&Array2::zeros((2, 2))).is_err());
    }

    #[test]
    fn test_max_and_abs() {
        let a = itv(&[-1.0, 2.0], &[3.0, 4.0]);
        let b = itv(&[0.0, 1.0], &[1.0, 5.0]);
        assert_eq!(pairs(&a.max(&b).unwrap()), vec![(0.0, 3.0), (2.0, 5.0)]);
        assert_eq!(pairs(&a.max_scalar(2.5)), vec![(2.5, 3.0), (2.5, 4.0)]);
        let c = itv(&[-3.0, 2.0, -5.0], &[1.0, 4.0, -2.0]);
        assert_eq!(pairs(&c.abs()), vec![(0.0, 3.0), (2.0, 4.0), (2.0, 5.0)]);
    }

    #[test]
    fn test_reshape_and_flatten() {
        let a = BoundedTensor::concrete(ArrayD::zeros(IxDyn(&[2, 3])));
        assert_eq!(a.reshape(&[3, 2]).unwrap().shape(), &[3, 2]);
        assert!(a.reshape(&[4]).is_err());
        assert_eq!(a.flatten().shape(), &[6]);
    }

    #[test]
    fn test_get_set_and_concretize() {
        let mut a = BoundedTensor::concrete(ArrayD::zeros(IxDyn(&[2])));
        a.set(&[1], Bound::new(-1.0, 1.0)).unwrap();
        assert_eq!(a.get(&[1]), Some(Bound::new(-1.0, 1.0)));
        assert_eq!(a.get(&[2]), None);
        assert!(a.set(&[5], Bound::concrete(0.0)).is_err());
        assert_eq!(a.max_width(), 2.0);
        assert!(a.concretize(1e-6).is_none());
        let p = BoundedTensor::from_epsilon(arr1(&[1.0]).into_dyn(), 1e-9);
        assert_eq!(p.concretize(1e-6).unwrap()[[0]], 1.0);
    }

    #[test]
    fn test_contains_and_special_values() {
        let a = itv(&[0.0, -1.0], &[1.0, 1.0]);
        assert!(a.contains(&arr1(&[0.5, 1.0]).into_dyn()));
        assert!(!a.contains(&arr1(&[1.5, 0.0]).into_dyn()));
        assert!(!a.contains(&arr1(&[0.5]).into_dyn()));
        assert!(!a.has_nan() && !a.has_infinite());
        let q = itv(&[0.0], &[0.0]).div(&itv(&[0.0], &[0.0])).unwrap();
        assert!(q.has_nan());
    }

    #[test]
    fn test_index_and_assign_axis0() {
        let mut a = BoundedTensor::concrete(ArrayD::zeros(IxDyn(&[2, 3])));
        a.assign_axis0(1, &itv(&[1.0, 2.0, 3.0], &[2.0, 3.0, 4.0])).unwrap();
        let row = a.index_axis0(1).unwrap();
        assert_eq!(row.get(&[2]), Some(Bound::new(3.0, 4.0)));
        assert!(a.index_axis0(2).is_err());
        assert!(a.assign_axis0(0, &itv(&[1.0], &[1.0])).is_err());
    }
}
