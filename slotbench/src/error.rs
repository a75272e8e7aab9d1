use thiserror::Error;

/// Error type engines use to report a failed request.
pub type EngineError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    /// The run configuration is unusable. Raised before anything is dispatched.
    #[error("configuration error: {0}")]
    Config(String),

    /// Statistics were requested over zero recorded latencies.
    #[error("no latencies were recorded")]
    EmptyResult,

    #[error("percentile {0} is outside of (0, 100]")]
    PercentileOutOfRange(f64),

    /// The engine reported a failed request. The run is aborted, never retried.
    #[error("engine failure on slot {slot:?}: {source}")]
    Engine {
        slot: Option<usize>,
        #[source]
        source: EngineError,
    },

    #[error("slot {0} is busy")]
    SlotBusy(usize),

    /// A slot was resubmitted while the latency of its previous occupancy was unread.
    #[error("slot {0} still holds an unharvested latency")]
    UnharvestedSlot(usize),

    #[error("slot {0} does not exist")]
    UnknownSlot(usize),

    #[error("the slot pool has no slots")]
    EmptyPool,

    /// A completion was awaited while no request was in flight.
    #[error("no request is in flight")]
    NothingInFlight,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    pub(crate) fn engine(slot: Option<usize>, source: EngineError) -> Self {
        BenchError::Engine { slot, source }
    }
}
