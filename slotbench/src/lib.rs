//! Slotbench: a bounded-concurrency benchmarking harness for inference engines.
//!
//! Slotbench drives an engine with a fixed pool of outstanding requests, measures the
//! latency of every request and reports throughput and latency percentiles, optionally
//! broken down by request group (for example one group per input shape).
//!
//! The harness never does the compute work: the engine and the source of inputs are
//! supplied by the caller through two small traits, and the harness only decides when
//! to submit what and how to account for it.
//!
//! # Architecture
//!
//! - [`ComputeEngine`]: the backend under test. Runs one request and reports its latency.
//! - [`DataFeeder`]: hands out inputs, their batch size and their latency group.
//! - [`ExecutionSlotPool`]: a fixed set of reusable request slots. A slot holds at most
//!   one request and keeps its latency until it is harvested, so no request is counted
//!   twice or lost.
//! - [`LatencyAggregate`]: collects harvested latencies and derives percentile, average,
//!   min and max, overall and per group.
//! - [`Benchmark`]: glue that validates a [`RunConfig`], picks one of the dispatch loops
//!   in [`executor`] and turns the run into a [`BenchReport`].
//! - [`Reporter`]: sends a [`BenchReport`] somewhere (stdout, a JSON file, ...).
//!
//! # Execution modes
//!
//! - `sync`: one request at a time. Throughput is estimated from the median latency.
//! - `async-only`: every slot kept busy on inputs the engine already holds. Throughput
//!   is `batch_size * iterations / elapsed`.
//! - `async-full`: every slot kept busy on inputs pulled from the feeder, one slot per
//!   latency group. Throughput is `processed_frames / elapsed`.
//!
//! Runs stop on an iteration limit, a duration limit or both, whichever is exhausted
//! first. Asynchronous runs then round their iteration count up to a multiple of the
//! pool size and drain every outstanding request before reporting.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use slotbench::{
//!     Benchmark, EngineError, ExecutionMode, Reporter, RunConfig,
//!     engine::FnEngine,
//!     report::StdoutReporter,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = FnEngine::new(|_: Option<()>| async {
//!         // Stand-in for a real inference request.
//!         tokio::time::sleep(Duration::from_millis(2)).await;
//!         Ok::<(), EngineError>(())
//!     });
//!
//!     let report = Benchmark::builder()
//!         .name("compute only")
//!         .config(
//!             RunConfig::builder()
//!                 .mode(ExecutionMode::AsyncOnly)
//!                 .pool_size(4)
//!                 .iteration_limit(32)
//!                 .build(),
//!         )
//!         .engine(engine)
//!         .build()
//!         .run()
//!         .await
//!         .unwrap();
//!
//!     StdoutReporter.report(&report).await.unwrap();
//! }
//! ```
//!
//! # Feature flags
//!
//! - `builtins`: ready-made [`FnEngine`](engine::FnEngine), [`CyclicFeeder`](feeder::CyclicFeeder),
//!   [`StdoutReporter`](report::StdoutReporter) and [`JsonReporter`](report::JsonReporter).
//!   (Enabled by default)
//! - `internals`: expose the dispatch loops of [`executor`] to build custom orchestration
//!   on top of the slot pool.

/// Latency collection and statistics
pub mod aggregate;
/// Entry point tying engine, configuration and dispatch together
pub mod benchmark;
/// Run configuration
pub mod config;
/// The engine under test
pub mod engine;
pub mod error;
/// Dispatch loops
pub mod executor;
/// Input sources
pub mod feeder;
/// Reusable request slots
pub mod pool;
/// Reports and Reporters
pub mod report;

pub use aggregate::{LatencyAggregate, LatencyStats, percentile};
pub use benchmark::Benchmark;
pub use config::{ExecutionMode, RunConfig};
pub use engine::ComputeEngine;
pub use error::{BenchError, EngineError, Result};
pub use feeder::{DataFeeder, GroupId};
pub use pool::ExecutionSlotPool;
pub use report::{BenchReport, Reporter};
