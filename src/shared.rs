use crate::clock::Clock;
use crate::engine::RaffleEngine;
use crate::error::RaffleError;
use crate::ledger::Ledger;
use crate::processor::Processor;
use crate::state::ParticipantId;
use crate::vrf::{RandomValue, RandomnessOracle, RequestId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Clonable handle serializing every operation on one engine.
///
/// The lock is held for the whole of `enter`, `begin_selection` and
/// `resolve`, so no caller observes a half-applied transition.
pub struct SharedRaffle<O, L, C> {
    inner: Arc<Mutex<RaffleEngine<O, L, C>>>,
}

impl<O, L, C> Clone for SharedRaffle<O, L, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O, L, C> SharedRaffle<O, L, C>
where
    O: RandomnessOracle,
    L: Ledger,
    C: Clock,
{
    pub fn new(engine: RaffleEngine<O, L, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    // Operations never leave the engine half-mutated, so a poisoned
    // lock still guards a consistent state.
    fn lock(&self) -> MutexGuard<'_, RaffleEngine<O, L, C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enter(&self, participant: ParticipantId, amount: u64) -> Result<(), RaffleError> {
        self.lock().enter(participant, amount)
    }

    pub fn check_ready(&self) -> bool {
        self.lock().check_ready()
    }

    pub fn begin_selection(&self) -> Result<RequestId, RaffleError> {
        self.lock().begin_selection()
    }

    pub fn resolve(&self, request_id: RequestId, random_value: RandomValue) -> Result<ParticipantId, RaffleError> {
        self.lock().resolve(request_id, random_value)
    }

    pub fn process(&self, instruction_data: &[u8]) -> Result<(), RaffleError> {
        let mut engine = self.lock();
        Processor::process(&mut *engine, instruction_data)
    }

    /// Run `f` against the engine under the lock
    pub fn with<R>(&self, f: impl FnOnce(&RaffleEngine<O, L, C>) -> R) -> R {
        let engine = self.lock();
        f(&*engine)
    }
}
