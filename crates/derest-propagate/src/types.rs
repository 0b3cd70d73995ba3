//! Configuration for derest runs and pruning.

use derest_core::{DerestError, IntervalConfig, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a derest run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerestConfig {
    /// Presets for every interval built during the run.
    pub interval: IntervalConfig,
    /// Log a warning when a layer yields non-finite bounds.
    pub check_finite: bool,
}

impl Default for DerestConfig {
    fn default() -> Self {
        Self {
            interval: IntervalConfig::default(),
            check_finite: true,
        }
    }
}

/// How much of a network the simple neuron deleter may remove.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PruningConfig {
    /// Fraction of all considered neurons to delete.
    pub p: f64,
    /// Largest fraction of any single layer that may be deleted.
    pub layer_limit: f64,
}

impl PruningConfig {
    pub fn new(p: f64, layer_limit: f64) -> Self {
        Self { p, layer_limit }
    }

    /// Both fractions must lie in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("p", self.p), ("layer_limit", self.layer_limit)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DerestError::invalid_parameter(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }

    /// The overall fraction actually reachable: never more than `layer_limit`.
    pub fn effective_p(&self) -> f64 {
        self.p.min(self.layer_limit)
    }
}
