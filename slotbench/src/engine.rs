use std::time::Duration;

use crate::error::EngineError;

/// The backend being benchmarked.
///
/// The harness never does compute work itself: it hands inputs to the engine and
/// records the latency the engine reports for each request. Requests accepted by
/// the engine may run concurrently, the harness only guarantees a single
/// outstanding request per slot.
///
/// `input` is `None` when the run is compute-only, meaning the engine runs on inputs
/// it already holds.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use slotbench::{ComputeEngine, EngineError};
///
/// struct Sleeper(Duration);
///
/// impl ComputeEngine for Sleeper {
///     type Input = ();
///
///     async fn infer(&self, _: Option<()>) -> Result<Duration, EngineError> {
///         tokio::time::sleep(self.0).await;
///         Ok(self.0)
///     }
/// }
/// ```
pub trait ComputeEngine
where
    Self: Send + Sync + 'static,
{
    type Input: Send + 'static;

    /// Run one request to completion and return its latency.
    fn infer(
        &self,
        input: Option<Self::Input>,
    ) -> impl Future<Output = Result<Duration, EngineError>> + Send;
}

#[cfg(feature = "builtins")]
pub use builtins::*;

#[cfg(feature = "builtins")]
mod builtins {
    use super::*;

    use std::marker::PhantomData;
    use tokio::time::Instant;

    /// Engine built from an async closure, timing each call on the tokio clock.
    ///
    /// Handy for simulated backends and for wrapping a client whose API doesn't
    /// report latencies on its own.
    pub struct FnEngine<I, F> {
        action: F,
        input: PhantomData<fn(I)>,
    }

    impl<I, F> FnEngine<I, F> {
        pub fn new<Fut>(action: F) -> Self
        where
            F: Fn(Option<I>) -> Fut,
            Fut: Future<Output = Result<(), EngineError>>,
        {
            Self {
                action,
                input: PhantomData,
            }
        }
    }

    impl<I, F, Fut> ComputeEngine for FnEngine<I, F>
    where
        I: Send + 'static,
        F: Fn(Option<I>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EngineError>> + Send,
    {
        type Input = I;

        async fn infer(&self, input: Option<I>) -> Result<Duration, EngineError> {
            let start = Instant::now();
            (self.action)(input).await?;
            Ok(start.elapsed())
        }
    }
}
