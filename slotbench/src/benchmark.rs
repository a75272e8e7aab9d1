use std::sync::Arc;

use typed_builder::TypedBuilder;

use crate::{
    aggregate::LatencyAggregate,
    config::{ExecutionMode, RunConfig},
    engine::ComputeEngine,
    error::{BenchError, Result},
    executor::{self, StopCondition},
    feeder::DataFeeder,
    pool::ExecutionSlotPool,
    report::BenchReport,
};

/// A configured benchmark of one engine.
///
/// The benchmark owns the engine. Each run creates a fresh slot pool sharing it, and
/// the pool is released once the run has drained.
#[derive(TypedBuilder)]
pub struct Benchmark<E: ComputeEngine> {
    #[builder(setter(into))]
    pub name: String,
    #[builder(default)]
    pub config: RunConfig,
    #[builder(setter(transform = |engine: E| Arc::new(engine)))]
    engine: Arc<E>,
}

impl<E: ComputeEngine> Benchmark<E> {
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Runs without a data feeder: the engine works on the inputs it already holds.
    ///
    /// The full pipeline mode needs a feeder and is rejected here.
    pub async fn run(&self) -> Result<BenchReport> {
        self.execute(None::<&mut dyn DataFeeder<Input = E::Input>>).await
    }

    /// Runs with inputs pulled from `feeder`. In compute-only mode the feeder is unused.
    pub async fn run_with_feeder<D>(&self, feeder: &mut D) -> Result<BenchReport>
    where
        D: DataFeeder<Input = E::Input> + ?Sized,
    {
        self.execute(Some(feeder)).await
    }

    async fn execute<D>(&self, feeder: Option<&mut D>) -> Result<BenchReport>
    where
        D: DataFeeder<Input = E::Input> + ?Sized,
    {
        let config = &self.config;
        config.validate()?;

        // Compute-only submissions carry no group
        let group_names = match (config.mode, feeder.as_deref()) {
            (ExecutionMode::AsyncOnly, _) | (_, None) => Vec::new(),
            (_, Some(f)) => f.groups().to_vec(),
        };
        match (config.mode, feeder.is_some()) {
            (ExecutionMode::AsyncFull, false) => return Err(missing_feeder()),
            (ExecutionMode::AsyncFull, true) if group_names.is_empty() => {
                return Err(BenchError::Config(
                    "the data feeder reports no latency groups".into(),
                ));
            }
            (ExecutionMode::AsyncOnly, true) => {
                tracing::warn!("Compute-only mode ignores the data feeder");
            }
            _ => {}
        }

        let pool_size = config.effective_pool_size(group_names.len());
        if let (true, Some(limit)) = (config.mode.is_async(), config.iteration_limit()) {
            if let Some(aligned) = aligned_limit(limit, pool_size as u64) {
                tracing::warn!(
                    "Number of iterations was aligned by request number from {limit} to {aligned}"
                );
            }
        }

        tracing::info!("Creating {pool_size} execution slots on {}", config.device);
        let mut pool = ExecutionSlotPool::new(Arc::clone(&self.engine), pool_size);
        if config.first_inference {
            executor::first_inference(&mut pool).await?;
        }

        let aggregate = LatencyAggregate::new(&group_names, config.per_group);
        let stop = StopCondition::from_config(config);
        tracing::info!(
            "Running {} in {:?} mode, limits: {:?} iterations, {:?}",
            self.name,
            config.mode,
            stop.iteration_limit,
            stop.duration_limit
        );

        let outcome = match (config.mode, feeder) {
            (ExecutionMode::Sync, feeder) => {
                executor::run_sync(&mut pool, feeder, stop, aggregate).await?
            }
            (ExecutionMode::AsyncOnly, _) => {
                executor::run_compute_only(&mut pool, stop, aggregate).await?
            }
            (ExecutionMode::AsyncFull, Some(feeder)) => {
                executor::run_pipeline(&mut pool, feeder, stop, aggregate).await?
            }
            (ExecutionMode::AsyncFull, None) => return Err(missing_feeder()),
        };
        drop(pool);

        tracing::info!("Processing results...");
        let report = BenchReport::from_outcome(config, outcome)?;
        tracing::info!("Done running benchmark: {}!", self.name);
        Ok(report)
    }
}

/// The iteration limit rounded up to a multiple of the pool size, if that changes it.
fn aligned_limit(limit: u64, pool_size: u64) -> Option<u64> {
    limit
        .checked_next_multiple_of(pool_size)
        .filter(|aligned| *aligned != limit)
}

fn missing_feeder() -> BenchError {
    BenchError::Config("the full pipeline mode needs a data feeder".into())
}
