use tokio::time::Instant;

use super::{RunOutcome, StopCondition};
use crate::{
    aggregate::LatencyAggregate,
    engine::ComputeEngine,
    error::{BenchError, Result},
    pool::ExecutionSlotPool,
};

/// Keeps every slot busy on inputs the engine already holds.
pub async fn run_compute_only<E: ComputeEngine>(
    pool: &mut ExecutionSlotPool<E>,
    stop: StopCondition,
    mut aggregate: LatencyAggregate,
) -> Result<RunOutcome> {
    if pool.size() == 0 {
        return Err(BenchError::EmptyPool);
    }
    let pool_size = pool.size() as u64;
    let mut iterations = 0u64;
    let start = Instant::now();
    let mut elapsed = start.elapsed();

    while stop.should_continue_aligned(iterations, elapsed, pool_size) {
        let slot = pool.acquire_idle().await?;
        match pool.take_latency(slot)? {
            Some(harvest) => aggregate.consume_harvest(&harvest)?,
            None => tracing::debug!(slot, "First occupancy"),
        }
        pool.submit(slot, None, None)?;

        iterations += 1;
        elapsed = start.elapsed();
    }

    tracing::info!("Draining {} in-flight requests", pool.in_flight());
    pool.drain_all().await?;
    let elapsed = start.elapsed();
    for harvest in pool.harvest_all()? {
        aggregate.consume_harvest(&harvest)?;
    }

    Ok(RunOutcome {
        aggregate,
        elapsed,
        iterations,
        processed_frames: 0,
    })
}
