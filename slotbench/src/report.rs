use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

use crate::{
    aggregate::GroupStats,
    config::{ExecutionMode, RunConfig},
    error::Result,
    executor::RunOutcome,
};

/// Frames per second, with the formula matching the execution mode:
///
/// - sync: `batch_size * 1000 / median_ms`, an estimate bound by the latency
/// - compute-only: `batch_size * iterations / elapsed_secs`
/// - pipeline: `processed_frames / elapsed_secs`
pub fn throughput_fps(
    mode: ExecutionMode,
    batch_size: usize,
    median: Duration,
    iterations: u64,
    processed_frames: u64,
    elapsed: Duration,
) -> f64 {
    match mode {
        ExecutionMode::Sync => batch_size as f64 * 1000.0 / (median.as_secs_f64() * 1000.0),
        ExecutionMode::AsyncOnly => batch_size as f64 * iterations as f64 / elapsed.as_secs_f64(),
        ExecutionMode::AsyncFull => processed_frames as f64 / elapsed.as_secs_f64(),
    }
}

/// Final statistics of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchReport {
    pub device: String,
    pub mode: ExecutionMode,
    pub throughput_fps: f64,
    /// Percentile reported as `median_latency`.
    pub percentile: f64,
    pub median_latency: Duration,
    pub avg_latency: Duration,
    pub min_latency: Duration,
    pub max_latency: Duration,
    pub total_elapsed_secs: f64,
    pub iterations: u64,
    pub processed_frames: u64,
    /// Present when per-group tracking was enabled.
    pub groups: Option<Vec<GroupStats>>,
    /// Every measured latency, ascending.
    #[serde(skip)]
    pub latencies: Vec<Duration>,
}

impl BenchReport {
    /// Derives the report from a drained run. Fails on a run without any latency.
    pub fn from_outcome(config: &RunConfig, outcome: RunOutcome) -> Result<Self> {
        let finalized = outcome.aggregate.finalize(config.percentile)?;
        let overall = finalized.overall;
        let throughput_fps = throughput_fps(
            config.mode,
            config.batch_size,
            overall.median,
            outcome.iterations,
            outcome.processed_frames,
            outcome.elapsed,
        );
        Ok(Self {
            device: config.device.clone(),
            mode: config.mode,
            throughput_fps,
            percentile: config.percentile,
            median_latency: overall.median,
            avg_latency: overall.average,
            min_latency: overall.min,
            max_latency: overall.max,
            total_elapsed_secs: outcome.elapsed.as_secs_f64(),
            iterations: outcome.iterations,
            processed_frames: outcome.processed_frames,
            groups: (config.per_group && !finalized.groups.is_empty()).then_some(finalized.groups),
            latencies: finalized.sorted,
        })
    }

    /// Iterations, or processed frames for the full pipeline.
    pub fn processed(&self) -> u64 {
        match self.mode {
            ExecutionMode::AsyncFull => self.processed_frames,
            _ => self.iterations,
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device:      {} ({:?})", self.device, self.mode)?;
        writeln!(f, "Count:       {} iterations", self.iterations)?;
        if self.mode == ExecutionMode::AsyncFull {
            writeln!(f, "Frames:      {}", self.processed_frames)?;
        }
        writeln!(f, "Duration:    {:.2} ms", self.total_elapsed_secs * 1000.0)?;
        writeln!(f, "Latency:")?;
        let label = if self.percentile == 50.0 {
            "Median".to_string()
        } else {
            format!("P{}", self.percentile)
        };
        writeln!(f, "    {label:<8}{:.2} ms", millis(self.median_latency))?;
        writeln!(f, "    {:<8}{:.2} ms", "AVG", millis(self.avg_latency))?;
        writeln!(f, "    {:<8}{:.2} ms", "MIN", millis(self.min_latency))?;
        writeln!(f, "    {:<8}{:.2} ms", "MAX", millis(self.max_latency))?;
        if let Some(groups) = &self.groups {
            writeln!(f, "Latency for each group:")?;
            for group in groups {
                write!(f, "    {}. {}: ", group.id + 1, group.name)?;
                match &group.stats {
                    Some(stats) => writeln!(
                        f,
                        "{label} {:.2} ms, AVG {:.2} ms, MIN {:.2} ms, MAX {:.2} ms",
                        millis(stats.median),
                        millis(stats.average),
                        millis(stats.min),
                        millis(stats.max),
                    )?,
                    None => writeln!(f, "no requests")?,
                }
            }
        }
        writeln!(f, "Throughput:  {:.2} FPS", self.throughput_fps)
    }
}

/// Sends a [`BenchReport`] somewhere: the terminal, a file, a metrics backend.
#[async_trait]
pub trait Reporter {
    async fn report(&self, report: &BenchReport) -> Result<()>;
}

#[cfg(feature = "builtins")]
pub use builtins::*;

#[cfg(feature = "builtins")]
mod builtins {
    use std::path::PathBuf;

    use super::*;

    /// Prints a human readable summary.
    pub struct StdoutReporter;

    #[async_trait]
    impl Reporter for StdoutReporter {
        async fn report(&self, report: &BenchReport) -> Result<()> {
            print!("{report}");
            Ok(())
        }
    }

    /// Writes the report as pretty-printed JSON, creating parent directories.
    pub struct JsonReporter {
        pub path: PathBuf,
    }

    impl JsonReporter {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }
    }

    #[async_trait]
    impl Reporter for JsonReporter {
        async fn report(&self, report: &BenchReport) -> Result<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let json = serde_json::to_vec_pretty(report)?;
            tokio::fs::write(&self.path, json).await?;
            tracing::info!("Report saved to {}", self.path.display());
            Ok(())
        }
    }
}
