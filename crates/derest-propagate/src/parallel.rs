//! Independent derest runs over several inputs.
//!
//! Each run is pure, so inputs are distributed over a rayon pool with no
//! shared state beyond an optional progress counter.
//!
//! # Example
//! ```ignore
//! use derest_propagate::parallel::{ParallelConfig, ParallelDerest};
//!
//! let runner = ParallelDerest::new(ParallelConfig::default());
//! let result = runner.derest_all(&network, &inputs)?;
//! for run in &result.results {
//!     println!("{:?}", run.output);
//! }
//! ```

use crate::network::{DerestResult, Network};
use crate::types::DerestConfig;
use derest_core::{DerestError, Result};
use derest_tensor::Interval;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, trace};

/// Configuration for parallel derest runs.
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Configuration of every individual run.
    pub derest: DerestConfig,

    /// Minimum number of inputs before enabling parallelism.
    /// Below this threshold, runs are serial to avoid pool overhead.
    pub min_inputs_for_parallel: usize,

    /// Maximum number of threads to use.
    /// None means use rayon's default (typically number of cores).
    pub max_threads: Option<usize>,

    /// Whether to log progress while running.
    pub report_progress: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            derest: DerestConfig::default(),
            min_inputs_for_parallel: 2,
            max_threads: None,
            report_progress: false,
        }
    }
}

/// Results of several derest runs, in input order.
#[derive(Debug)]
pub struct ParallelDerestResult<I> {
    pub results: Vec<DerestResult<I>>,

    /// Number of inputs processed.
    pub num_inputs: usize,

    /// Number of inputs processed in parallel (vs serial).
    pub parallel_inputs: usize,

    /// Total time in milliseconds.
    pub total_time_ms: u64,

    /// Average time per input in milliseconds.
    pub avg_input_time_ms: f64,
}

/// Runs derest over many inputs using rayon.
pub struct ParallelDerest {
    config: ParallelConfig,
}

impl ParallelDerest {
    pub fn new(config: ParallelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParallelConfig {
        &self.config
    }

    /// Run derest once per input.
    pub fn derest_all<I: Interval>(
        &self,
        network: &Network,
        inputs: &[I],
    ) -> Result<ParallelDerestResult<I>> {
        let start_time = std::time::Instant::now();
        let num_inputs = inputs.len();
        info!(
            "Parallel derest: {} inputs through {} layers",
            num_inputs,
            network.len()
        );

        let use_parallel = num_inputs >= self.config.min_inputs_for_parallel;
        let parallel_inputs = if use_parallel { num_inputs } else { 0 };

        let results = if use_parallel {
            self.parallel_impl(network, inputs)?
        } else {
            debug!(
                "Using serial derest ({} inputs < threshold {})",
                num_inputs, self.config.min_inputs_for_parallel
            );
            inputs
                .iter()
                .enumerate()
                .map(|(i, input)| {
                    trace!("Derest input {}/{} (serial)", i + 1, num_inputs);
                    network.derest(input, &self.config.derest)
                })
                .collect::<Result<Vec<_>>>()?
        };

        let total_time_ms = start_time.elapsed().as_millis() as u64;
        let avg_input_time_ms = if num_inputs == 0 {
            0.0
        } else {
            total_time_ms as f64 / num_inputs as f64
        };

        info!(
            "Parallel derest complete: {}ms total, {:.2}ms/input",
            total_time_ms, avg_input_time_ms
        );

        Ok(ParallelDerestResult {
            results,
            num_inputs,
            parallel_inputs,
            total_time_ms,
            avg_input_time_ms,
        })
    }

    fn parallel_impl<I: Interval>(
        &self,
        network: &Network,
        inputs: &[I],
    ) -> Result<Vec<DerestResult<I>>> {
        let progress = AtomicUsize::new(0);
        let num_inputs = inputs.len();

        // Build the thread pool with optional thread limit
        let pool = if let Some(max_threads) = self.config.max_threads {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(max_threads)
                    .build()
                    .map_err(|e| {
                        DerestError::invalid_parameter(format!(
                            "Failed to create thread pool: {}",
                            e
                        ))
                    })?,
            )
        } else {
            None
        };

        let report_progress = self.config.report_progress;
        let config = &self.config.derest;

        let run_one = |(i, input): (usize, &I)| -> Result<DerestResult<I>> {
            trace!("Derest input {}/{}", i + 1, num_inputs);
            let result = network.derest(input, config)?;
            if report_progress {
                let completed = progress.fetch_add(1, Ordering::Relaxed) + 1;
                if completed % 10 == 0 || completed == num_inputs {
                    debug!("Progress: {}/{} inputs", completed, num_inputs);
                }
            }
            Ok(result)
        };

        if let Some(pool) = pool {
            pool.install(|| inputs.par_iter().enumerate().map(run_one).collect())
        } else {
            inputs.par_iter().enumerate().map(run_one).collect()
        }
    }
}

/// Derest every input with the default parallel configuration.
pub fn derest_parallel<I: Interval>(
    network: &Network,
    inputs: &[I],
) -> Result<ParallelDerestResult<I>> {
    ParallelDerest::new(ParallelConfig::default()).derest_all(network, inputs)
}

impl Network {
    /// Run derest once per input, in parallel when there are enough inputs.
    pub fn derest_parallel<I: Interval>(
        &self,
        inputs: &[I],
        config: &ParallelConfig,
    ) -> Result<Vec<DerestResult<I>>> {
        Ok(ParallelDerest::new(config.clone())
            .derest_all(self, inputs)?
            .results)
    }
}
