use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{BenchError, Result};

/// How requests are dispatched to the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// One request at a time, each awaited before the next is issued.
    Sync,
    /// Keep the pool saturated with inputs already bound to the engine.
    AsyncOnly,
    /// Keep the pool saturated with inputs pulled from a data feeder.
    #[default]
    AsyncFull,
}

impl ExecutionMode {
    pub fn is_async(&self) -> bool {
        !matches!(self, ExecutionMode::Sync)
    }
}

/// Immutable description of a benchmark run.
///
/// A zero iteration limit or a zero duration limit counts as unset. At least one
/// of the two limits must be set, see [`RunConfig::validate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct RunConfig {
    #[builder(default = String::from("CPU"), setter(into))]
    pub device: String,
    #[builder(default)]
    pub mode: ExecutionMode,
    /// Number of concurrent requests in compute-only mode. Sync mode always uses one
    /// slot and the full pipeline uses one slot per latency group.
    #[builder(default = num_cpus::get())]
    pub pool_size: usize,
    #[builder(default, setter(strip_option))]
    pub iteration_limit: Option<u64>,
    #[builder(default, setter(strip_option))]
    #[serde(with = "opt_secs")]
    pub duration_limit: Option<Duration>,
    /// Percentile reported as the "median" latency, in `(0, 100]`.
    #[builder(default = 50.0)]
    pub percentile: f64,
    /// Frames carried by one request, used by the sync and compute-only throughput.
    #[builder(default = 1)]
    pub batch_size: usize,
    #[builder(default = false)]
    pub per_group: bool,
    /// Issue one unmeasured request before the run starts.
    #[builder(default = true)]
    pub first_inference: bool,
    /// Architecture description required by FPGA devices.
    #[builder(default, setter(strip_option, into))]
    pub arch_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig::builder().build()
    }
}

impl RunConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn iteration_limit(&self) -> Option<u64> {
        self.iteration_limit.filter(|n| *n > 0)
    }

    pub fn duration_limit(&self) -> Option<Duration> {
        self.duration_limit.filter(|d| !d.is_zero())
    }

    /// Fills in the device's default duration when neither limit was given.
    pub fn with_device_default_duration(mut self) -> Self {
        if self.iteration_limit().is_none() && self.duration_limit().is_none() {
            let secs = device_default_duration_secs(&self.device);
            tracing::warn!(
                "No iteration or duration limit given, running for the {} default of {secs}s",
                self.device
            );
            self.duration_limit = Some(Duration::from_secs(secs));
        }
        self
    }

    /// Rejects configurations that can't be run. Nothing has been dispatched yet when
    /// this fails.
    pub fn validate(&self) -> Result<()> {
        if self.iteration_limit().is_none() && self.duration_limit().is_none() {
            return Err(BenchError::Config(
                "either an iteration limit or a duration limit is required".into(),
            ));
        }
        if !(self.percentile > 0.0 && self.percentile <= 100.0) {
            return Err(BenchError::Config(format!(
                "latency percentile must be in (0, 100], got {}",
                self.percentile
            )));
        }
        if self.batch_size == 0 {
            return Err(BenchError::Config("batch size must be positive".into()));
        }
        if self.mode == ExecutionMode::AsyncOnly && self.pool_size == 0 {
            return Err(BenchError::Config("pool size must be positive".into()));
        }
        if self.device.contains("FPGA") && self.arch_path.is_none() {
            return Err(BenchError::Config(
                "FPGA devices need the path to an architecture file".into(),
            ));
        }
        Ok(())
    }

    /// Number of slots the run will use given the number of latency groups.
    pub fn effective_pool_size(&self, groups: usize) -> usize {
        match self.mode {
            ExecutionMode::Sync => {
                if self.pool_size > 1 {
                    tracing::warn!(
                        "Sync mode runs a single request at a time, ignoring pool size {}",
                        self.pool_size
                    );
                }
                1
            }
            ExecutionMode::AsyncOnly => self.pool_size,
            ExecutionMode::AsyncFull => groups,
        }
    }
}

fn device_default_duration_secs(device: &str) -> u64 {
    let name = device.split([':', '.']).next().unwrap_or(device);
    match name {
        "CPU" | "GPU" | "VPU" | "MYRIAD" | "HDDL" => 60,
        _ => 120,
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(d)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
            .transpose()
    }
}
