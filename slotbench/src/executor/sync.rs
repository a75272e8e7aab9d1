use tokio::time::Instant;

use super::{RunOutcome, StopCondition};
use crate::{
    aggregate::LatencyAggregate, engine::ComputeEngine, error::Result, feeder::DataFeeder,
    pool::ExecutionSlotPool,
};

/// One request at a time: submit, wait, record.
///
/// Without a feeder the engine runs on the inputs it already holds.
pub async fn run_sync<E, D>(
    pool: &mut ExecutionSlotPool<E>,
    mut feeder: Option<&mut D>,
    stop: StopCondition,
    mut aggregate: LatencyAggregate,
) -> Result<RunOutcome>
where
    E: ComputeEngine,
    D: DataFeeder<Input = E::Input> + ?Sized,
{
    let mut iterations = 0u64;
    let mut processed_frames = 0u64;
    let start = Instant::now();
    let mut elapsed = start.elapsed();

    while stop.should_continue(iterations, elapsed) {
        let (input, group) = match feeder.as_deref_mut() {
            Some(feeder) => {
                processed_frames += feeder.next_batch_size() as u64;
                let group = feeder.current_group();
                (Some(feeder.next_input()), Some(group))
            }
            None => (None, None),
        };
        let slot = pool.acquire_idle().await?;
        let harvest = pool.submit_blocking(slot, input, group).await?;
        aggregate.consume_harvest(&harvest)?;

        iterations += 1;
        elapsed = start.elapsed();
    }

    Ok(RunOutcome {
        aggregate,
        elapsed: start.elapsed(),
        iterations,
        processed_frames,
    })
}
