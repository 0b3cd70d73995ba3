//! Named `(fraction_pruned, error_rate)` results of pruning experiments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of one pruning experiment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultPoint {
    pub fraction_pruned: f64,
    pub error_rate: f64,
}

impl ResultPoint {
    pub fn new(fraction_pruned: f64, error_rate: f64) -> Self {
        Self {
            fraction_pruned,
            error_rate,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsTable {
    entries: BTreeMap<String, ResultPoint>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the result named `name`.
    pub fn insert(&mut self, name: impl Into<String>, point: ResultPoint) -> Option<ResultPoint> {
        self.entries.insert(name.into(), point)
    }

    pub fn get(&self, name: &str) -> Option<&ResultPoint> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultPoint)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add every entry of `other`; on a name clash `other` wins.
    pub fn merge(&mut self, other: ResultsTable) {
        self.entries.extend(other.entries);
    }

    /// Points sorted by fraction pruned, ready for plotting.
    pub fn points(&self) -> Vec<(f64, f64)> {
        let mut points: Vec<(f64, f64)> = self
            .entries
            .values()
            .map(|p| (p.fraction_pruned, p.error_rate))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ResultsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ResultsError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Merge two saved tables into a third file.
    pub fn merge_files(
        out: impl AsRef<Path>,
        first: impl AsRef<Path>,
        second: impl AsRef<Path>,
    ) -> Result<Self, ResultsError> {
        let mut merged = Self::load_json(first)?;
        merged.merge(Self::load_json(second)?);
        merged.save_json(out)?;
        Ok(merged)
    }
}

impl FromIterator<(String, ResultPoint)> for ResultsTable {
    fn from_iter<T: IntoIterator<Item = (String, ResultPoint)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
