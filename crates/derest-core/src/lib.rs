//! Core types for derest, the interval-arithmetic derivative estimator.
//!
//! This crate holds what every other derest crate agrees on: the scalar
//! [`Bound`], the error taxonomy, the numeric presets used to build fresh
//! intervals, and the small parameter records describing pooling and local
//! response normalization.

pub mod params;

pub use params::{Exponent, LrnParams, PoolMode, PoolParams};

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, RangeInclusive};
use thiserror::Error;

/// A bound on a scalar value: [lower, upper].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    /// Create a new bound.
    #[inline]
    pub fn new(lower: f64, upper: f64) -> Self {
        debug_assert!(
            lower <= upper || (lower == f64::INFINITY && upper == f64::NEG_INFINITY),
            "Invalid bound: {lower} > {upper}"
        );
        Self { lower, upper }
    }

    /// Create a concrete (point) bound.
    #[inline]
    pub fn concrete(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    /// The canonical empty bound `(+inf, -inf)`, the identity of [`Bound::union`].
    #[inline]
    pub fn empty() -> Self {
        Self {
            lower: f64::INFINITY,
            upper: f64::NEG_INFINITY,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lower > self.upper
    }

    /// Check if this bound contains a value.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Whether zero lies strictly inside the bound.
    #[inline]
    pub fn straddles_zero(&self) -> bool {
        self.lower < 0.0 && self.upper > 0.0
    }

    /// Width of the bound interval.
    #[inline]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Check if bounds have exploded to infinity.
    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.lower.is_infinite() || self.upper.is_infinite()
    }

    /// Intersect two bounds.
    #[inline]
    pub fn intersect(&self, other: &Bound) -> Option<Bound> {
        let lower = self.lower.max(other.lower);
        let upper = self.upper.min(other.upper);
        if lower <= upper {
            Some(Bound { lower, upper })
        } else {
            None
        }
    }

    /// Union of two bounds (convex hull).
    #[inline]
    pub fn union(&self, other: &Bound) -> Bound {
        Bound {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    /// Bound-wise inverse of `+`: the bound that, added to `other`, gives `self`.
    #[inline]
    pub fn antiadd(&self, other: &Bound) -> Bound {
        Bound {
            lower: self.lower - other.lower,
            upper: self.upper - other.upper,
        }
    }

    /// Multiply by a plain scalar.
    #[inline]
    pub fn scale(&self, factor: f64) -> Bound {
        let a = self.lower * factor;
        let b = self.upper * factor;
        Bound {
            lower: a.min(b),
            upper: a.max(b),
        }
    }

    /// Widen the bound so that it includes `value`.
    #[inline]
    pub fn include(&self, value: f64) -> Bound {
        Bound {
            lower: self.lower.min(value),
            upper: self.upper.max(value),
        }
    }
}

/// Interval sum.
impl Add for Bound {
    type Output = Bound;

    #[inline]
    fn add(self, other: Bound) -> Bound {
        Bound {
            lower: self.lower + other.lower,
            upper: self.upper + other.upper,
        }
    }
}

/// Interval product: min and max over the four corner products.
impl Mul for Bound {
    type Output = Bound;

    #[inline]
    fn mul(self, other: Bound) -> Bound {
        let ll = self.lower * other.lower;
        let lu = self.lower * other.upper;
        let ul = self.upper * other.lower;
        let uu = self.upper * other.upper;
        Bound {
            lower: ll.min(lu).min(ul.min(uu)),
            upper: ll.max(lu).max(ul.max(uu)),
        }
    }
}

impl From<RangeInclusive<f64>> for Bound {
    fn from(range: RangeInclusive<f64>) -> Self {
        Self::new(*range.start(), *range.end())
    }
}

/// Which preset pair `from_shape` falls back to when no explicit value is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Fill {
    /// The neutral pair: nothing known yet, nothing accumulated yet.
    #[default]
    Neutral,
    /// The default pair: the range of an uninformed network input.
    Default,
}

/// Numeric presets threaded into every interval construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalConfig {
    /// Pair used for [`Fill::Neutral`].
    pub neutral: Bound,
    /// Pair used for [`Fill::Default`].
    pub default: Bound,
    /// Slack allowed when checking `lower <= upper` at construction.
    pub tolerance: f64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            neutral: Bound::concrete(0.0),
            default: Bound::new(0.0, 255.0),
            tolerance: 1e-4,
        }
    }
}

impl IntervalConfig {
    /// Resolve the `(lower, upper)` fill values for a new interval.
    ///
    /// Explicit values win over the preset. A pair with `lower > upper` is
    /// rejected unless it is the canonical empty pair `(+inf, -inf)`.
    pub fn resolve(&self, fill: Fill, lower: Option<f64>, upper: Option<f64>) -> Result<Bound> {
        let preset = match fill {
            Fill::Neutral => self.neutral,
            Fill::Default => self.default,
        };
        let lower = lower.unwrap_or(preset.lower);
        let upper = upper.unwrap_or(preset.upper);
        if lower > upper && !(lower == f64::INFINITY && upper == f64::NEG_INFINITY) {
            return Err(DerestError::InvalidInterval {
                index: Vec::new(),
                lower,
                upper,
            });
        }
        Ok(Bound { lower, upper })
    }
}

/// Macro to create ShapeMismatch error with debug assertion.
#[macro_export]
macro_rules! shape_mismatch_err {
    ($expected:expr, $got:expr) => {{
        let exp: Vec<usize> = $expected;
        let got: Vec<usize> = $got;
        debug_assert!(
            exp != got,
            "BUG: ShapeMismatch with identical shapes {:?} at {}:{}:{}",
            exp,
            file!(),
            line!(),
            column!()
        );
        $crate::DerestError::ShapeMismatch { expected: exp, got }
    }};
}

/// Error types for derest operations.
#[derive(Error, Debug)]
pub enum DerestError {
    /// Lower bound above upper bound beyond tolerance.
    #[error("Invalid interval at {index:?}: lower {lower} > upper {upper}")]
    InvalidInterval {
        index: Vec<usize>,
        lower: f64,
        upper: f64,
    },

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    #[error("Rank mismatch: expected a rank-{expected} tensor, got shape {got:?}")]
    RankMismatch { expected: usize, got: Vec<usize> },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The interval realization does not implement this primitive.
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("No binding for symbolic input '{0}'")]
    UnboundInput(String),

    #[error("Layer {layer_index} ({layer_type}) failed: {source}")]
    LayerError {
        layer_index: usize,
        layer_type: String,
        #[source]
        source: Box<DerestError>,
    },
}

impl DerestError {
    /// Create a ShapeMismatch error, panicking if shapes are identical (bug indicator).
    #[track_caller]
    pub fn shape_mismatch(expected: Vec<usize>, got: Vec<usize>) -> Self {
        if expected == got {
            let loc = std::panic::Location::caller();
            panic!(
                "BUG at {}:{}:{}: ShapeMismatch created with identical shapes: {:?}.",
                loc.file(),
                loc.line(),
                loc.column(),
                expected
            );
        }
        DerestError::ShapeMismatch { expected, got }
    }

    pub fn not_supported(what: impl Into<String>) -> Self {
        DerestError::NotSupported(what.into())
    }

    pub fn invalid_parameter(what: impl Into<String>) -> Self {
        DerestError::InvalidParameter(what.into())
    }

    /// True when the error only says a primitive is missing, so a caller may
    /// substitute a composed implementation.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, DerestError::NotSupported(_))
    }

    /// Attach orchestrator context to a layer failure.
    pub fn in_layer(self, layer_index: usize, layer_type: impl Into<String>) -> Self {
        DerestError::LayerError {
            layer_index,
            layer_type: layer_type.into(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, DerestError>;
