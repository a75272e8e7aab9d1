use std::time::Duration;

use slotbench::{
    Benchmark, EngineError, ExecutionMode, Reporter, RunConfig,
    engine::FnEngine,
    feeder::{CyclicFeeder, FeedEntry},
    report::{JsonReporter, StdoutReporter},
};

#[derive(Clone)]
struct Frame {
    width: u64,
    height: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    // Simulated accelerator, latency grows with the pixel count
    let engine = FnEngine::new(|frame: Option<Frame>| async move {
        let pixels = frame.map(|f| f.width * f.height).unwrap_or(224 * 224);
        tokio::time::sleep(Duration::from_micros(pixels / 50)).await;
        Ok::<(), EngineError>(())
    });

    // One latency group per input shape
    let mut feeder = CyclicFeeder::new(
        vec!["1x3x224x224".into(), "1x3x512x512".into()],
        vec![
            FeedEntry::new(0, 1, Frame { width: 224, height: 224 }),
            FeedEntry::new(1, 1, Frame { width: 512, height: 512 }),
        ],
    )
    .unwrap();

    let report = Benchmark::builder()
        .name("Simulated accelerator")
        .config(
            RunConfig::builder()
                .device("SIM")
                .mode(ExecutionMode::AsyncFull)
                .duration_limit(Duration::from_secs(3))
                .per_group(true)
                .build(),
        )
        .engine(engine)
        .build()
        .run_with_feeder(&mut feeder)
        .await
        .unwrap();

    StdoutReporter.report(&report).await.unwrap();
    JsonReporter::new("target/slotbench/simulated.json")
        .report(&report)
        .await
        .unwrap();
}
