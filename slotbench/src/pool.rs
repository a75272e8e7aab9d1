//! Fixed-size pool of reusable request slots.
//!
//! Each slot holds at most one outstanding request. Submitting spawns the engine call
//! on the tokio runtime; completions come back through a [`JoinSet`], so waiting for a
//! free slot is a wait on the next completion rather than a poll over the slots.
//!
//! A completed request leaves its latency in the slot until it is harvested with
//! [`ExecutionSlotPool::take_latency`]. The slot refuses a new submission while that
//! latency is unread, which makes "one latency per occupancy" a property of the pool
//! rather than of the caller's bookkeeping.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::task::{self, JoinSet};

use crate::{
    engine::ComputeEngine,
    error::{BenchError, EngineError, Result},
    feeder::GroupId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Busy,
}

#[derive(Clone, Debug)]
pub struct ExecutionSlot {
    id: usize,
    state: SlotState,
    latency: Option<Duration>,
    group: Option<GroupId>,
    occupancies: u64,
}

impl ExecutionSlot {
    fn new(id: usize) -> Self {
        Self {
            id,
            state: SlotState::Idle,
            latency: None,
            group: None,
            occupancies: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Group attached at the last submission.
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// Number of submissions this slot has received.
    pub fn occupancies(&self) -> u64 {
        self.occupancies
    }

    /// Whether a finished occupancy is waiting to be harvested.
    pub fn has_unharvested(&self) -> bool {
        self.latency.is_some()
    }
}

/// A finished occupancy taken out of its slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Harvest {
    pub slot: usize,
    pub latency: Duration,
    pub group: Option<GroupId>,
}

type Completion = (usize, std::result::Result<Duration, EngineError>);

pub struct ExecutionSlotPool<E: ComputeEngine> {
    engine: Arc<E>,
    slots: Vec<ExecutionSlot>,
    in_flight: JoinSet<Completion>,
    /// Slot of every in-flight task, to attribute panics.
    tasks: HashMap<task::Id, usize>,
}

impl<E: ComputeEngine> ExecutionSlotPool<E> {
    pub fn new(engine: Arc<E>, size: usize) -> Self {
        tracing::debug!("Creating a pool of {size} slots");
        Self {
            engine,
            slots: (0..size).map(ExecutionSlot::new).collect(),
            in_flight: JoinSet::new(),
            tasks: HashMap::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[ExecutionSlot] {
        &self.slots
    }

    /// Requests submitted and not completed yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns an idle slot, waiting for the next completion if every slot is busy.
    ///
    /// The returned slot may still hold the latency of its previous occupancy.
    pub async fn acquire_idle(&mut self) -> Result<usize> {
        if let Some(slot) = self.slots.iter().find(|s| s.state == SlotState::Idle) {
            return Ok(slot.id);
        }
        if self.slots.is_empty() {
            return Err(BenchError::EmptyPool);
        }
        self.complete_next().await
    }

    /// Hands `input` to the engine on `slot`, without waiting for the result.
    pub fn submit(
        &mut self,
        slot: usize,
        input: Option<E::Input>,
        group: Option<GroupId>,
    ) -> Result<()> {
        let record = self.slot_mut(slot)?;
        if record.state == SlotState::Busy {
            return Err(BenchError::SlotBusy(slot));
        }
        if record.latency.is_some() {
            return Err(BenchError::UnharvestedSlot(slot));
        }
        record.state = SlotState::Busy;
        record.group = group;
        record.occupancies += 1;

        let engine = Arc::clone(&self.engine);
        let handle = self
            .in_flight
            .spawn(async move { (slot, engine.infer(input).await) });
        self.tasks.insert(handle.id(), slot);
        Ok(())
    }

    /// Submits to `slot` and waits for that single request to finish.
    ///
    /// Only meaningful when nothing else is in flight, as in the sync mode.
    pub async fn submit_blocking(
        &mut self,
        slot: usize,
        input: Option<E::Input>,
        group: Option<GroupId>,
    ) -> Result<Harvest> {
        self.submit(slot, input, group)?;
        self.drain_all().await?;
        self.take_latency(slot)?.ok_or(BenchError::EmptyResult)
    }

    /// Latency of the last finished occupancy of `slot`, if not harvested yet.
    pub fn latency_of(&self, slot: usize) -> Result<Option<Duration>> {
        let record = self.slot(slot)?;
        if record.state == SlotState::Busy {
            return Err(BenchError::SlotBusy(slot));
        }
        Ok(record.latency)
    }

    /// Takes the latency of the last finished occupancy out of `slot`.
    ///
    /// Returns `None` for a slot that was never used or was already harvested.
    pub fn take_latency(&mut self, slot: usize) -> Result<Option<Harvest>> {
        let record = self.slot_mut(slot)?;
        if record.state == SlotState::Busy {
            return Err(BenchError::SlotBusy(slot));
        }
        Ok(record.latency.take().map(|latency| Harvest {
            slot,
            latency,
            group: record.group,
        }))
    }

    /// Waits until every submitted request has completed.
    pub async fn drain_all(&mut self) -> Result<()> {
        while !self.in_flight.is_empty() {
            self.complete_next().await?;
        }
        Ok(())
    }

    /// Harvests every slot still holding a latency, in slot order.
    pub fn harvest_all(&mut self) -> Result<Vec<Harvest>> {
        let mut harvested = Vec::new();
        for slot in 0..self.slots.len() {
            if let Some(h) = self.take_latency(slot)? {
                harvested.push(h);
            }
        }
        Ok(harvested)
    }

    async fn complete_next(&mut self) -> Result<usize> {
        let Some(joined) = self.in_flight.join_next_with_id().await else {
            return Err(BenchError::NothingInFlight);
        };
        let (slot, outcome) = match joined {
            Ok((id, completion)) => {
                self.tasks.remove(&id);
                completion
            }
            Err(e) => {
                let slot = self.tasks.remove(&e.id());
                return Err(BenchError::engine(slot, Box::new(e)));
            }
        };
        let latency = outcome.map_err(|e| BenchError::engine(Some(slot), e))?;

        let record = self.slot_mut(slot)?;
        record.state = SlotState::Idle;
        record.latency = Some(latency);
        tracing::debug!(slot, ?latency, "Request completed");
        Ok(slot)
    }

    fn slot(&self, slot: usize) -> Result<&ExecutionSlot> {
        self.slots.get(slot).ok_or(BenchError::UnknownSlot(slot))
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut ExecutionSlot> {
        self.slots.get_mut(slot).ok_or(BenchError::UnknownSlot(slot))
    }
}

#[cfg(all(test, feature = "builtins"))]
mod tests {
    use super::*;
    use crate::engine::FnEngine;

    fn sleeper() -> Arc<impl ComputeEngine<Input = u64>> {
        Arc::new(FnEngine::new(|ms: Option<u64>| async move {
            tokio::time::sleep(Duration::from_millis(ms.unwrap_or(1))).await;
            Ok::<(), EngineError>(())
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn hands_out_idle_slots_first() {
        let mut pool = ExecutionSlotPool::new(sleeper(), 3);
        assert_eq!(pool.size(), 3);

        for expected in 0..3 {
            let slot = pool.acquire_idle().await.unwrap();
            assert_eq!(slot, expected);
            pool.submit(slot, Some(10), None).unwrap();
        }
        assert_eq!(pool.in_flight(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_the_fastest_completion() {
        let mut pool = ExecutionSlotPool::new(sleeper(), 3);
        pool.submit(0, Some(30), Some(0)).unwrap();
        pool.submit(1, Some(5), Some(1)).unwrap();
        pool.submit(2, Some(20), Some(2)).unwrap();

        let slot = pool.acquire_idle().await.unwrap();
        assert_eq!(slot, 1);
        assert_eq!(pool.latency_of(1).unwrap(), Some(Duration::from_millis(5)));
        assert_eq!(pool.in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refuses_busy_and_unharvested_slots() {
        let mut pool = ExecutionSlotPool::new(sleeper(), 1);
        pool.submit(0, Some(1), None).unwrap();
        assert!(matches!(pool.submit(0, Some(1), None), Err(BenchError::SlotBusy(0))));
        assert!(matches!(pool.take_latency(0), Err(BenchError::SlotBusy(0))));

        pool.drain_all().await.unwrap();
        assert!(matches!(
            pool.submit(0, Some(1), None),
            Err(BenchError::UnharvestedSlot(0))
        ));

        let harvest = pool.take_latency(0).unwrap().unwrap();
        assert_eq!(harvest.latency, Duration::from_millis(1));
        assert_eq!(pool.take_latency(0).unwrap(), None);
        pool.submit(0, Some(1), None).unwrap();
        assert!(matches!(pool.submit(7, None, None), Err(BenchError::UnknownSlot(7))));
    }

    #[tokio::test(start_paused = true)]
    async fn drain_then_harvest_each_slot_once() {
        let mut pool = ExecutionSlotPool::new(sleeper(), 4);
        for slot in 0..3 {
            pool.submit(slot, Some(10 * (slot as u64 + 1)), Some(slot)).unwrap();
        }
        pool.drain_all().await.unwrap();
        assert_eq!(pool.in_flight(), 0);

        let harvested = pool.harvest_all().unwrap();
        assert_eq!(
            harvested,
            vec![
                Harvest { slot: 0, latency: Duration::from_millis(10), group: Some(0) },
                Harvest { slot: 1, latency: Duration::from_millis(20), group: Some(1) },
                Harvest { slot: 2, latency: Duration::from_millis(30), group: Some(2) },
            ]
        );
        assert!(pool.harvest_all().unwrap().is_empty());
        assert!(pool.slots().iter().all(|s| s.state() == SlotState::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_blocking_returns_the_latency() {
        let mut pool = ExecutionSlotPool::new(sleeper(), 1);
        let harvest = pool.submit_blocking(0, Some(4), None).await.unwrap();
        assert_eq!(harvest.latency, Duration::from_millis(4));
        assert_eq!(pool.slots()[0].occupancies(), 1);
        assert!(!pool.slots()[0].has_unharvested());
    }

    #[tokio::test]
    async fn engine_failures_abort() {
        let engine = Arc::new(FnEngine::new(|_: Option<()>| async {
            Err::<(), EngineError>("out of device memory".into())
        }));
        let mut pool = ExecutionSlotPool::new(engine, 2);
        pool.submit(1, None, None).unwrap();

        let err = pool.drain_all().await.unwrap_err();
        assert!(matches!(err, BenchError::Engine { slot: Some(1), .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_engine_is_attributed_to_its_slot() {
        let engine = FnEngine::new(|ms: Option<u64>| async move {
            if ms == Some(0) {
                panic!("engine crashed");
            }
            tokio::time::sleep(Duration::from_millis(ms.unwrap_or(1))).await;
            Ok::<(), EngineError>(())
        });
        let mut pool = ExecutionSlotPool::new(Arc::new(engine), 3);
        pool.submit(0, Some(20), None).unwrap();
        pool.submit(1, Some(20), None).unwrap();
        pool.submit(2, Some(0), None).unwrap();

        let err = pool.drain_all().await.unwrap_err();
        assert!(matches!(err, BenchError::Engine { slot: Some(2), .. }), "{err:?}");
    }

    #[tokio::test]
    async fn waiting_with_nothing_in_flight_is_refused() {
        let mut pool = ExecutionSlotPool::new(sleeper(), 0);
        assert!(matches!(pool.acquire_idle().await, Err(BenchError::EmptyPool)));
        assert!(matches!(pool.complete_next().await, Err(BenchError::NothingInFlight)));
    }
}
