//! Dispatch loops driving the slot pool.
//!
//! Three strategies exist, one per [`ExecutionMode`](crate::config::ExecutionMode):
//!
//! - **sync**: a single slot, each request awaited before the next one is issued.
//! - **compute-only**: every slot kept busy with inputs the engine already holds.
//! - **pipeline**: every slot kept busy with inputs pulled from a
//!   [`DataFeeder`](crate::feeder::DataFeeder), one slot per latency group.
//!
//! # Stop condition
//!
//! All loops continue while
//!
//! ```text
//! (no iteration limit OR iterations < limit) AND (no duration limit OR elapsed < limit)
//! ```
//!
//! Elapsed time is sampled once per iteration, so a duration-bound run overshoots its
//! limit by up to one iteration. The asynchronous loops keep going past the limits
//! until the iteration count is a multiple of the pool size: every slot then carries
//! the same number of occupancies when the run ends.
//!
//! # Harvesting
//!
//! A slot coming back from [`acquire_idle`](crate::pool::ExecutionSlotPool::acquire_idle)
//! either was never used (its first occupancy is about to start, there is nothing to
//! record) or holds the latency of its previous occupancy, which is recorded before the
//! slot is reused. After the loop, a drain and a single flush record the latencies of
//! the last occupancies. Every submission therefore contributes exactly one latency.
//!
//! There is no cancellation: a run ends when its limits are exhausted and the pool is
//! drained, or when the engine reports a failure, which aborts it.
mod pipeline;
mod saturate;
mod sync;

#[cfg(feature = "internals")]
pub use {pipeline::run_pipeline, saturate::run_compute_only, sync::run_sync};
#[cfg(not(feature = "internals"))]
pub(crate) use {pipeline::run_pipeline, saturate::run_compute_only, sync::run_sync};

use std::time::Duration;

use crate::{
    aggregate::LatencyAggregate,
    config::RunConfig,
    engine::ComputeEngine,
    error::Result,
    pool::ExecutionSlotPool,
};

/// Iteration and duration budgets of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StopCondition {
    pub iteration_limit: Option<u64>,
    pub duration_limit: Option<Duration>,
}

impl StopCondition {
    pub fn new(iteration_limit: Option<u64>, duration_limit: Option<Duration>) -> Self {
        Self {
            iteration_limit,
            duration_limit,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.iteration_limit(), config.duration_limit())
    }

    pub fn should_continue(&self, iterations: u64, elapsed: Duration) -> bool {
        self.iteration_limit.is_none_or(|limit| iterations < limit)
            && self.duration_limit.is_none_or(|limit| elapsed < limit)
    }

    /// Same as [`should_continue`](Self::should_continue), but also keeps going until
    /// `iterations` is a multiple of `pool_size`.
    pub fn should_continue_aligned(
        &self,
        iterations: u64,
        elapsed: Duration,
        pool_size: u64,
    ) -> bool {
        self.should_continue(iterations, elapsed)
            || iterations.checked_rem(pool_size).is_some_and(|r| r != 0)
    }
}

/// What a dispatch loop hands back once the pool is drained.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    pub aggregate: LatencyAggregate,
    /// Wall time from the first dispatch to the end of the drain.
    pub elapsed: Duration,
    pub iterations: u64,
    /// Sum of the batch sizes reported by the feeder. Zero without a feeder.
    pub processed_frames: u64,
}

/// Runs a single unmeasured request through the pool and returns its latency.
pub async fn first_inference<E: ComputeEngine>(
    pool: &mut ExecutionSlotPool<E>,
) -> Result<Duration> {
    let slot = pool.acquire_idle().await?;
    let harvest = pool.submit_blocking(slot, None, None).await?;
    tracing::info!(
        "First inference took {:.2} ms",
        harvest.latency.as_secs_f64() * 1000.0
    );
    Ok(harvest.latency)
}
