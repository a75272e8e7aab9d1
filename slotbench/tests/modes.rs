use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use slotbench::{
    BenchError, Benchmark, ComputeEngine, EngineError, ExecutionMode, RunConfig,
    feeder::{CyclicFeeder, FeedEntry},
};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Engine whose latency is given by the input (or a default), counting submissions.
struct ScriptedEngine {
    default: Duration,
    submitted: Arc<AtomicU64>,
}

impl ComputeEngine for ScriptedEngine {
    type Input = u64;

    async fn infer(&self, input: Option<u64>) -> Result<Duration, EngineError> {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        let latency = input.map(Duration::from_millis).unwrap_or(self.default);
        tokio::time::sleep(latency).await;
        Ok(latency)
    }
}

fn engine(default: Duration) -> (ScriptedEngine, Arc<AtomicU64>) {
    let submitted = Arc::new(AtomicU64::new(0));
    (
        ScriptedEngine {
            default,
            submitted: Arc::clone(&submitted),
        },
        submitted,
    )
}

fn config(mode: ExecutionMode) -> RunConfig {
    RunConfig::builder()
        .mode(mode)
        .first_inference(false)
        .build()
}

#[tokio::test(start_paused = true)]
async fn sync_iteration_limit_is_exact() {
    let (engine, submitted) = engine(ms(10));
    let mut config = config(ExecutionMode::Sync);
    config.iteration_limit = Some(10);

    let report = Benchmark::builder()
        .name("sync")
        .config(config)
        .engine(engine)
        .build()
        .run()
        .await
        .unwrap();

    assert_eq!(report.iterations, 10);
    assert_eq!(submitted.load(Ordering::Relaxed), 10);
    assert!((report.throughput_fps - 100.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn compute_only_duration_limit_then_drain() {
    let (engine, submitted) = engine(ms(7));
    let mut config = config(ExecutionMode::AsyncOnly);
    config.pool_size = 4;
    config.duration_limit = Some(ms(100));

    let report = Benchmark::builder()
        .name("duration")
        .config(config)
        .engine(engine)
        .build()
        .run()
        .await
        .unwrap();

    assert!(report.total_elapsed_secs >= 0.1);
    assert_eq!(report.iterations % 4, 0);
    assert_eq!(report.latencies.len() as u64, report.iterations);
    assert_eq!(submitted.load(Ordering::Relaxed), report.iterations);
    let expected = report.iterations as f64 / report.total_elapsed_secs;
    assert!((report.throughput_fps - expected).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn pipeline_with_uneven_latencies_records_every_request_once() {
    let (engine, submitted) = engine(ms(1));
    let mut feeder = CyclicFeeder::new(
        vec!["A".into(), "B".into()],
        vec![
            FeedEntry::new(0, 1, 3),
            FeedEntry::new(1, 8, 17),
            FeedEntry::new(0, 1, 5),
            FeedEntry::new(1, 8, 11),
        ],
    )
    .unwrap();
    let mut config = config(ExecutionMode::AsyncFull);
    config.iteration_limit = Some(21);
    config.per_group = true;

    let report = Benchmark::builder()
        .name("pipeline")
        .config(config)
        .engine(engine)
        .build()
        .run_with_feeder(&mut feeder)
        .await
        .unwrap();

    assert_eq!(report.iterations, 22);
    assert_eq!(submitted.load(Ordering::Relaxed), 22);
    assert_eq!(report.latencies.len(), 22);
    assert_eq!(report.processed_frames, 11 + 11 * 8);

    let groups = report.groups.as_ref().unwrap();
    let a = groups[0].stats.unwrap();
    let b = groups[1].stats.unwrap();
    assert_eq!(a.count + b.count, 22);
    assert!(a.max <= ms(5));
    assert!(b.min >= ms(11));
}

#[tokio::test]
async fn no_limits_means_no_submission() {
    for mode in [ExecutionMode::Sync, ExecutionMode::AsyncOnly, ExecutionMode::AsyncFull] {
        let (engine, submitted) = engine(ms(1));
        let mut feeder = CyclicFeeder::from_inputs(vec![(1, 1)]).unwrap();
        let result = Benchmark::builder()
            .name("unbounded")
            .config(config(mode))
            .engine(engine)
            .build()
            .run_with_feeder(&mut feeder)
            .await;

        assert!(matches!(result, Err(BenchError::Config(_))), "{mode:?}");
        assert_eq!(submitted.load(Ordering::Relaxed), 0);
    }
}
