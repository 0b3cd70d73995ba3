//! Static parameters of the layers whose bounds derest propagates.

use crate::{DerestError, Result};
use serde::{Deserialize, Serialize};

/// Exponent passed to `power`.
///
/// Integer exponents are handled for any sign of the base. Real exponents
/// assume a non-negative base; nothing checks that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Exponent {
    Int(i32),
    Real(f64),
}

impl Exponent {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Exponent::Int(n) => n as f64,
            Exponent::Real(r) => r,
        }
    }
}

impl From<i32> for Exponent {
    fn from(n: i32) -> Self {
        Exponent::Int(n)
    }
}

impl From<f64> for Exponent {
    fn from(r: f64) -> Self {
        Exponent::Real(r)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolMode {
    Max,
    Avg,
}

/// Pooling window geometry, all pairs in (height, width) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    pub poolsize: (usize, usize),
    pub stride: (usize, usize),
    pub padding: (usize, usize),
}

impl PoolParams {
    /// Unit stride, no padding.
    pub fn new(poolsize: (usize, usize)) -> Self {
        Self {
            poolsize,
            stride: (1, 1),
            padding: (0, 0),
        }
    }

    pub fn with_stride(mut self, stride: (usize, usize)) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: (usize, usize)) -> Self {
        self.padding = padding;
        self
    }

    /// Reject geometries the pooling rules cannot handle.
    pub fn validate(&self) -> Result<()> {
        if self.poolsize == (1, 1) {
            return Err(DerestError::invalid_parameter(
                "poolsize (1, 1) is not a pooling window",
            ));
        }
        if self.poolsize.0 == 0 || self.poolsize.1 == 0 {
            return Err(DerestError::invalid_parameter(format!(
                "poolsize must be positive, got {:?}",
                self.poolsize
            )));
        }
        if self.stride.0 == 0 || self.stride.1 == 0 {
            return Err(DerestError::invalid_parameter(format!(
                "stride must be positive, got {:?}",
                self.stride
            )));
        }
        Ok(())
    }

    /// Spatial output size for an input of `(height, width)`; border windows
    /// that do not fit entirely are dropped.
    pub fn output_dims(&self, height: usize, width: usize) -> Result<(usize, usize)> {
        window_count(height, self.poolsize.0, self.stride.0, self.padding.0)
            .zip(window_count(width, self.poolsize.1, self.stride.1, self.padding.1))
            .ok_or_else(|| {
                DerestError::invalid_parameter(format!(
                    "pool window {:?} with padding {:?} does not fit input {}x{}",
                    self.poolsize, self.padding, height, width
                ))
            })
    }
}

/// Number of windows of `size` placed every `stride` over `extent + 2 * padding`.
pub fn window_count(extent: usize, size: usize, stride: usize, padding: usize) -> Option<usize> {
    let padded = extent + 2 * padding;
    if size == 0 || stride == 0 || padded < size {
        return None;
    }
    Some((padded - size) / stride + 1)
}

/// Local response normalization across channels:
/// `x / (k + alpha / local_range * sum(neighbour^2))^beta`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LrnParams {
    pub local_range: usize,
    pub k: f64,
    /// Total coefficient, divided by `local_range` in each term.
    pub alpha: f64,
    pub beta: f64,
}

impl Default for LrnParams {
    /// AlexNet values.
    fn default() -> Self {
        Self {
            local_range: 5,
            k: 1.0,
            alpha: 0.0001,
            beta: 0.75,
        }
    }
}

impl LrnParams {
    pub fn new(local_range: usize, k: f64, alpha: f64, beta: f64) -> Self {
        Self {
            local_range,
            k,
            alpha,
            beta,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.local_range == 0 {
            return Err(DerestError::invalid_parameter("local_range must be positive"));
        }
        if self.k.is_nan() || self.k <= 0.0 || self.alpha < 0.0 {
            return Err(DerestError::invalid_parameter(format!(
                "LRN needs k > 0 and alpha >= 0, got k={} alpha={}",
                self.k, self.alpha
            )));
        }
        Ok(())
    }

    /// Coefficient of each squared neighbour inside the denominator.
    pub fn alpha_per_term(&self) -> f64 {
        self.alpha / self.local_range as f64
    }

    /// Channel offsets of the neighbours of a channel, the channel itself excluded.
    pub fn neighbour_offsets(&self) -> impl Iterator<Item = isize> {
        let half = (self.local_range / 2) as isize;
        (0..self.local_range as isize)
            .map(move |i| i - half)
            .filter(|&offset| offset != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponent_conversions() {
        assert_eq!(Exponent::from(3), Exponent::Int(3));
        assert_eq!(Exponent::from(0.5), Exponent::Real(0.5));
        assert_eq!(Exponent::Int(-2).as_f64(), -2.0);
    }

    #[test]
    fn test_pool_validate_rejects_unit_window() {
        let err = PoolParams::new((1, 1)).validate().unwrap_err();
        assert!(err.to_string().contains("(1, 1)"));
        assert!(PoolParams::new((2, 2)).validate().is_ok());
        assert!(PoolParams::new((2, 2))
            .with_stride((0, 1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_pool_output_dims() {
        assert_eq!(PoolParams::new((2, 2)).output_dims(3, 3).unwrap(), (2, 2));
        let strided = PoolParams::new((2, 2)).with_stride((3, 3));
        assert_eq!(strided.output_dims(5, 5).unwrap(), (2, 2));
        let padded = strided.with_padding((1, 1));
        assert_eq!(padded.output_dims(3, 3).unwrap(), (2, 2));
        assert!(PoolParams::new((4, 4)).output_dims(3, 3).is_err());
    }

    #[test]
    fn test_lrn_neighbour_offsets_odd_range() {
        let p = LrnParams::new(5, 1.0, 1e-4, 0.75);
        assert_eq!(p.neighbour_offsets().collect::<Vec<_>>(), vec![-2, -1, 1, 2]);
    }

    #[test]
    fn test_lrn_neighbour_offsets_even_range() {
        let p = LrnParams::new(4, 1.0, 1e-4, 0.75);
        assert_eq!(p.neighbour_offsets().collect::<Vec<_>>(), vec![-2, -1, 1]);
    }

    #[test]
    fn test_lrn_validate() {
        assert!(LrnParams::default().validate().is_ok());
        assert!(LrnParams::new(0, 1.0, 1e-4, 0.75).validate().is_err());
        assert!(LrnParams::new(5, 0.0, 1e-4, 0.75).validate().is_err());
    }
}
