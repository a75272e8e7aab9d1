use tokio::time::Instant;

use super::{RunOutcome, StopCondition};
use crate::{
    aggregate::LatencyAggregate,
    engine::ComputeEngine,
    error::{BenchError, Result},
    feeder::DataFeeder,
    pool::ExecutionSlotPool,
};

/// Keeps every slot busy on inputs pulled from `feeder`, tagging each submission with
/// the input's latency group.
///
/// The pool is expected to hold one slot per latency group.
pub async fn run_pipeline<E, D>(
    pool: &mut ExecutionSlotPool<E>,
    feeder: &mut D,
    stop: StopCondition,
    mut aggregate: LatencyAggregate,
) -> Result<RunOutcome>
where
    E: ComputeEngine,
    D: DataFeeder<Input = E::Input> + ?Sized,
{
    if feeder.groups().is_empty() {
        return Err(BenchError::Config(
            "the data feeder reports no latency groups".into(),
        ));
    }
    if pool.size() == 0 {
        return Err(BenchError::EmptyPool);
    }
    let groups = feeder.groups().len() as u64;
    let mut iterations = 0u64;
    let mut processed_frames = 0u64;
    let start = Instant::now();
    let mut elapsed = start.elapsed();

    while stop.should_continue_aligned(iterations, elapsed, groups) {
        processed_frames += feeder.next_batch_size() as u64;
        let slot = pool.acquire_idle().await?;
        match pool.take_latency(slot)? {
            Some(harvest) => aggregate.consume_harvest(&harvest)?,
            None => tracing::debug!(slot, "First occupancy"),
        }
        let group = feeder.current_group();
        pool.submit(slot, Some(feeder.next_input()), Some(group))?;

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
        processed_frames,
    })
}
