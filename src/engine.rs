//! Selection state machine.
//!
//! `Open` rounds accept entries until the upkeep conditions hold, then
//! `begin_selection` requests randomness and moves the round to
//! `Calculating`. The oracle later calls `resolve` with the request id,
//! the winner is paid and the next round opens.

use crate::clock::{Clock, UnixTimestamp};
use crate::config::RaffleConfig;
use crate::error::{ConfigError, RaffleError};
use crate::events::{EventSink, RaffleEvent};
use crate::ledger::Ledger;
use crate::state::{ParticipantId, RaffleState, Round};
use crate::vrf::{winner_index, PendingRequest, PendingRequests, RandomValue, RandomnessOracle, RequestId};
use borsh::{BorshDeserialize, BorshSerialize};
use log::{debug, info, warn};

/// First unmet upkeep condition, or `Ready`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpkeepStatus {
    Ready,
    NotOpen,
    IntervalNotElapsed,
    NoPlayers,
    NoBalance,
    /// No free slot to correlate another request
    RequestTableFull,
}

/// Persisted form of the mutable engine state
#[derive(BorshSerialize, BorshDeserialize)]
struct EngineState {
    round: Round,
    pending: PendingRequests,
}

pub struct RaffleEngine<O, L, C> {
    config: RaffleConfig,
    round: Round,
    pending: PendingRequests,
    oracle: O,
    ledger: L,
    clock: C,
    sinks: Vec<Box<dyn EventSink>>,
}

impl<O, L, C> RaffleEngine<O, L, C>
where
    O: RandomnessOracle,
    L: Ledger,
    C: Clock,
{
    /// Start the first round at the current time
    pub fn new(config: RaffleConfig, oracle: O, ledger: L, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let round = Round::new(clock.unix_timestamp());

        info!(
            "Raffle initialized: EntranceFee={}, Interval={}s",
            config.minimum_entry_amount, config.minimum_round_interval
        );

        Ok(Self {
            config,
            round,
            pending: PendingRequests::default(),
            oracle,
            ledger,
            clock,
            sinks: Vec::new(),
        })
    }

    /// Rebuild an engine from bytes produced by [`Self::export_state`].
    /// An outstanding request survives and can still be resolved.
    pub fn restore(
        config: RaffleConfig,
        data: &[u8],
        oracle: O,
        ledger: L,
        clock: C,
    ) -> Result<Self, RaffleError> {
        config.validate().map_err(|_| RaffleError::InvalidState)?;
        let EngineState { round, pending } =
            EngineState::try_from_slice(data).map_err(|_| RaffleError::InvalidState)?;

        let engine = Self {
            config,
            round,
            pending,
            oracle,
            ledger,
            clock,
            sinks: Vec::new(),
        };
        if !engine.is_consistent() {
            warn!("Restored state is not one the engine can reach");
            return Err(RaffleError::InvalidState);
        }

        info!(
            "Raffle restored: round={}, state={:?}",
            engine.round.round_index, engine.round.state
        );
        Ok(engine)
    }

    pub fn export_state(&self) -> Result<Vec<u8>, RaffleError> {
        EngineState {
            round: self.round.clone(),
            pending: self.pending.clone(),
        }
        .try_to_vec()
        .map_err(|_| RaffleError::InvalidState)
    }

    pub fn subscribe<S>(&mut self, sink: S)
    where
        S: EventSink + 'static,
    {
        self.sinks.push(Box::new(sink));
    }

    /// Buy one lottery slot for `participant`
    pub fn enter(&mut self, participant: ParticipantId, amount: u64) -> Result<(), RaffleError> {
        if let Err(err) = self
            .round
            .enter(participant, amount, self.config.minimum_entry_amount)
        {
            info!("Entry rejected for {}: {}", participant, err);
            return Err(err);
        }

        debug!(
            "Entry accepted: participant={}, amount={}, slots={}, pool={}",
            participant,
            amount,
            self.round.pool.len(),
            self.round.pool.pool_total()
        );
        self.emit(RaffleEvent::EntryAccepted { participant, amount });
        Ok(())
    }

    /// Pure readiness predicate, safe to poll at any cadence
    pub fn check_ready(&self) -> bool {
        self.check_upkeep().0
    }

    pub fn check_upkeep(&self) -> (bool, UpkeepStatus) {
        let status = self.upkeep_status(self.clock.unix_timestamp());
        (status == UpkeepStatus::Ready, status)
    }

    fn upkeep_status(&self, now: UnixTimestamp) -> UpkeepStatus {
        if self.round.state != RaffleState::Open {
            UpkeepStatus::NotOpen
        } else if self.round.elapsed(now) < self.config.minimum_round_interval {
            UpkeepStatus::IntervalNotElapsed
        } else if self.round.pool.is_empty() {
            UpkeepStatus::NoPlayers
        } else if self.round.pool.pool_total() == 0 {
            UpkeepStatus::NoBalance
        } else if self.pending.is_full() {
            UpkeepStatus::RequestTableFull
        } else {
            UpkeepStatus::Ready
        }
    }

    /// Request randomness for the current round. Anyone may call this;
    /// readiness is re-checked here rather than trusted from the caller.
    pub fn begin_selection(&mut self) -> Result<RequestId, RaffleError> {
        let now = self.clock.unix_timestamp();
        let status = self.upkeep_status(now);
        if status != UpkeepStatus::Ready {
            info!("Upkeep not needed: {:?}", status);
            return Err(RaffleError::UpkeepNotReady);
        }

        let request_id = self
            .oracle
            .request_random_words(&self.config.vrf)
            .map_err(|err| {
                warn!("Randomness request failed: {}", err);
                RaffleError::OracleRequestFailed(err)
            })?;

        self.pending.insert(PendingRequest {
            request_id,
            snapshot: self.round.pool.snapshot(),
            requested_at: now,
        })?;
        self.round.state = RaffleState::Calculating;

        info!(
            "Randomness requested: request={}, slots={}, pool={}",
            request_id,
            self.round.pool.len(),
            self.round.pool.pool_total()
        );
        self.emit(RaffleEvent::SelectionStarted { request_id });
        Ok(request_id)
    }

    /// Oracle callback. Pays the winner, then opens the next round.
    ///
    /// A rejected payout leaves the round calculating with the same
    /// request, so the identical call can be replayed.
    pub fn resolve(
        &mut self,
        request_id: RequestId,
        random_value: RandomValue,
    ) -> Result<ParticipantId, RaffleError> {
        let pending = self.pending.get(&request_id).ok_or_else(|| {
            info!("Fulfillment for unknown request {}", request_id);
            RaffleError::UnknownRequest
        })?;

        let snapshot = &pending.snapshot;
        let index = winner_index(&random_value, snapshot.entrants.len());
        let winner = *snapshot.entrants.get(index).ok_or(RaffleError::InvalidState)?;
        let amount = snapshot.pool_total;
        debug!("Random winner index: {} of {}", index, snapshot.entrants.len());

        if let Err(err) = self.ledger.payout(&winner, amount) {
            warn!("Payout of {} to {} failed: {}", amount, winner, err);
            return Err(RaffleError::PayoutFailed(err));
        }

        self.pending.remove(&request_id);
        let round_index = self.round.round_index;
        self.round.complete(winner, self.clock.unix_timestamp());

        info!("Winner picked: round={}, winner={}, prize={}", round_index, winner, amount);
        self.emit(RaffleEvent::WinnerPicked {
            winner,
            amount,
            request_id,
            round_index,
        });
        Ok(winner)
    }

    /// Fulfillment carrying several words; the first one picks the winner
    pub fn resolve_words(
        &mut self,
        request_id: RequestId,
        random_words: &[RandomValue],
    ) -> Result<ParticipantId, RaffleError> {
        let first = random_words.first().ok_or(RaffleError::NoRandomWords)?;
        self.resolve(request_id, *first)
    }

    fn emit(&self, event: RaffleEvent) {
        debug!("Event: {:?}", event);
        for sink in &self.sinks {
            sink.emit(&event);
        }
    }

    /// Calculating exactly when a request is outstanding, the pool adds
    /// up, and every outstanding request froze the current pool.
    pub fn is_consistent(&self) -> bool {
        if self.pending.capacity() == 0 || self.pending.len() > self.pending.capacity() as usize {
            return false;
        }
        if (self.round.state == RaffleState::Calculating) == self.pending.is_empty() {
            return false;
        }
        if !self.round.pool.is_consistent() {
            return false;
        }
        let live = self.round.pool.snapshot();
        self.pending
            .iter()
            .all(|r| !r.snapshot.entrants.is_empty() && r.snapshot == live)
    }

    pub fn config(&self) -> &RaffleConfig {
        &self.config
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.minimum_entry_amount
    }

    pub fn interval(&self) -> u64 {
        self.config.minimum_round_interval
    }

    pub fn num_words(&self) -> u32 {
        self.config.vrf.num_words
    }

    pub fn request_confirmations(&self) -> u16 {
        self.config.vrf.request_confirmations
    }

    pub fn raffle_state(&self) -> RaffleState {
        self.round.state
    }

    pub fn player(&self, index: usize) -> Option<ParticipantId> {
        self.round.pool.player(index)
    }

    pub fn number_of_players(&self) -> usize {
        self.round.pool.len()
    }

    pub fn pool_total(&self) -> u64 {
        self.round.pool.pool_total()
    }

    pub fn stake_of(&self, participant: &ParticipantId) -> u64 {
        self.round.pool.stake_of(participant)
    }

    pub fn last_timestamp(&self) -> UnixTimestamp {
        self.round.last_resolution_timestamp
    }

    pub fn recent_winner(&self) -> Option<ParticipantId> {
        self.round.recent_winner
    }

    pub fn round_index(&self) -> u64 {
        self.round.round_index
    }

    pub fn outstanding_request(&self) -> Option<RequestId> {
        self.pending.iter().next().map(|r| r.request_id)
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LedgerError, OracleError};
    use crate::events::EventLog;
    use crate::mock::{InMemoryLedger, ManualClock, MockVrfCoordinator};
    use crate::state::EntryPool;

    type TestEngine = RaffleEngine<MockVrfCoordinator, InMemoryLedger, ManualClock>;

    fn config() -> RaffleConfig {
        RaffleConfig {
            minimum_entry_amount: 10,
            minimum_round_interval: 30,
            ..RaffleConfig::default()
        }
    }

    fn setup() -> (TestEngine, MockVrfCoordinator, InMemoryLedger, ManualClock) {
        let coordinator = MockVrfCoordinator::new();
        let ledger = InMemoryLedger::new();
        let clock = ManualClock::new(1_000);
        let engine = RaffleEngine::new(config(), coordinator.clone(), ledger.clone(), clock.clone()).unwrap();
        (engine, coordinator, ledger, clock)
    }

    #[test]
    fn test_new_rejects_zero_entry_amount() {
        let config = RaffleConfig {
            minimum_entry_amount: 0,
            ..config()
        };
        let result = RaffleEngine::new(
            config,
            MockVrfCoordinator::new(),
            InMemoryLedger::new(),
            ManualClock::new(0),
        );
        assert!(matches!(result, Err(ConfigError::ZeroEntryAmount)));
    }

    #[test]
    fn test_upkeep_status_names_first_unmet_condition() {
        let (mut engine, _, _, clock) = setup();
        assert_eq!(engine.check_upkeep(), (false, UpkeepStatus::IntervalNotElapsed));

        clock.advance(30);
        assert_eq!(engine.check_upkeep(), (false, UpkeepStatus::NoPlayers));

        engine.enter(ParticipantId::new_unique(), 10).unwrap();
        assert_eq!(engine.check_upkeep(), (true, UpkeepStatus::Ready));

        engine.begin_selection().unwrap();
        assert_eq!(engine.check_upkeep(), (false, UpkeepStatus::NotOpen));
    }

    #[test]
    fn test_oracle_refusal_leaves_round_open() {
        let (mut engine, coordinator, _, clock) = setup();
        coordinator.set_funded(false);
        engine.enter(ParticipantId::new_unique(), 10).unwrap();
        clock.advance(30);

        assert_eq!(
            engine.begin_selection(),
            Err(RaffleError::OracleRequestFailed(OracleError::SubscriptionNotFunded))
        );
        assert_eq!(engine.raffle_state(), RaffleState::Open);
        assert_eq!(engine.outstanding_request(), None);
        assert!(engine.is_consistent());

        coordinator.set_funded(true);
        assert!(engine.begin_selection().is_ok());
    }

    #[test]
    fn test_payout_failure_keeps_request() {
        let (mut engine, _, ledger, clock) = setup();
        let a = ParticipantId::new_unique();
        engine.enter(a, 10).unwrap();
        clock.advance(30);
        let request_id = engine.begin_selection().unwrap();

        ledger.reject_next(1, LedgerError::InsufficientFunds);
        assert_eq!(
            engine.resolve(request_id, RandomValue::from(3u64)),
            Err(RaffleError::PayoutFailed(LedgerError::InsufficientFunds))
        );
        assert_eq!(engine.raffle_state(), RaffleState::Calculating);
        assert_eq!(engine.outstanding_request(), Some(request_id));
        assert_eq!(engine.number_of_players(), 1);
        assert_eq!(ledger.balance_of(&a), 0);

        assert_eq!(engine.resolve(request_id, RandomValue::from(3u64)), Ok(a));
        assert_eq!(ledger.balance_of(&a), 10);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_resolve_words_uses_first_word() {
        let (mut engine, _, _, clock) = setup();
        let a = ParticipantId::new_unique();
        let b = ParticipantId::new_unique();
        engine.enter(a, 10).unwrap();
        engine.enter(b, 10).unwrap();
        clock.advance(30);
        let request_id = engine.begin_selection().unwrap();

        assert_eq!(engine.resolve_words(request_id, &[]), Err(RaffleError::NoRandomWords));
        assert_eq!(engine.raffle_state(), RaffleState::Calculating);

        let words = [RandomValue::from(1u64), RandomValue::from(0u64)];
        assert_eq!(engine.resolve_words(request_id, &words), Ok(b));
    }

    #[test]
    fn test_winner_picked_carries_round_index() {
        let (mut engine, _, _, clock) = setup();
        let log = EventLog::new();
        engine.subscribe(log.clone());
        let a = ParticipantId::new_unique();

        engine.enter(a, 10).unwrap();
        clock.advance(30);
        let request_id = engine.begin_selection().unwrap();
        engine.resolve(request_id, RandomValue::from(0u64)).unwrap();

        assert_eq!(
            log.last(),
            Some(RaffleEvent::WinnerPicked {
                winner: a,
                amount: 10,
                request_id,
                round_index: 1,
            })
        );
        assert_eq!(engine.round_index(), 2);
        assert_eq!(engine.recent_winner(), Some(a));
    }

    #[test]
    fn test_export_and_restore_outstanding_request() {
        let (mut engine, coordinator, ledger, clock) = setup();
        let a = ParticipantId::new_unique();
        engine.enter(a, 25).unwrap();
        clock.advance(31);
        let request_id = engine.begin_selection().unwrap();

        let bytes = engine.export_state().unwrap();
        let mut restored =
            TestEngine::restore(config(), &bytes, coordinator, ledger.clone(), clock).unwrap();

        assert_eq!(restored.raffle_state(), RaffleState::Calculating);
        assert_eq!(restored.outstanding_request(), Some(request_id));
        assert_eq!(restored.resolve(request_id, RandomValue::from(9u64)), Ok(a));
        assert_eq!(ledger.balance_of(&a), 25);
    }

    #[test]
    fn test_full_request_table_blocks_selection_before_oracle_call() {
        let (mut engine, coordinator, _, clock) = setup();
        engine.pending = PendingRequests::with_capacity(0);
        engine.enter(ParticipantId::new_unique(), 10).unwrap();
        clock.advance(30);

        assert_eq!(engine.check_upkeep(), (false, UpkeepStatus::RequestTableFull));
        assert_eq!(engine.begin_selection(), Err(RaffleError::UpkeepNotReady));
        assert!(coordinator.pending_requests().is_empty());
        assert_eq!(coordinator.last_request_id(), None);
        assert_eq!(engine.raffle_state(), RaffleState::Open);
    }

    fn restore_from(round: Round, pending: PendingRequests) -> Result<TestEngine, RaffleError> {
        let bytes = EngineState { round, pending }.try_to_vec().unwrap();
        TestEngine::restore(
            config(),
            &bytes,
            MockVrfCoordinator::new(),
            InMemoryLedger::new(),
            ManualClock::new(0),
        )
    }

    fn calculating_round(entrants: &[ParticipantId]) -> (Round, PendingRequests) {
        let mut round = Round::new(0);
        for participant in entrants {
            round.enter(*participant, 10, 10).unwrap();
        }
        let mut pending = PendingRequests::default();
        pending
            .insert(PendingRequest {
                request_id: RequestId(1),
                snapshot: round.pool.snapshot(),
                requested_at: 30,
            })
            .unwrap();
        round.state = RaffleState::Calculating;
        (round, pending)
    }

    #[test]
    fn test_restore_rejects_inconsistent_state() {
        let a = ParticipantId::new_unique();
        let b = ParticipantId::new_unique();

        // calculating without a request
        let mut round = Round::new(0);
        round.state = RaffleState::Calculating;
        assert!(matches!(
            restore_from(round, PendingRequests::default()),
            Err(RaffleError::InvalidState)
        ));

        // request table that can never hold a request
        assert!(matches!(
            restore_from(Round::new(0), PendingRequests::with_capacity(0)),
            Err(RaffleError::InvalidState)
        ));

        // snapshot that does not match the frozen pool
        let (mut round, pending) = calculating_round(&[a]);
        round.pool.add_entry(b, 10).unwrap();
        assert!(matches!(restore_from(round, pending), Err(RaffleError::InvalidState)));

        // empty snapshot
        let (round, pending) = calculating_round(&[]);
        assert!(matches!(restore_from(round, pending), Err(RaffleError::InvalidState)));

        // pool total that disagrees with the stakes; it is the last field
        let (mut round, pending) = calculating_round(&[a, b]);
        let mut pool_bytes = round.pool.try_to_vec().unwrap();
        let len = pool_bytes.len();
        pool_bytes[len - 8..].copy_from_slice(&99u64.to_le_bytes());
        round.pool = EntryPool::try_from_slice(&pool_bytes).unwrap();
        assert_eq!(round.pool.pool_total(), 99);
        assert!(matches!(restore_from(round, pending), Err(RaffleError::InvalidState)));

        // a consistent calculating state restores
        let (round, pending) = calculating_round(&[a, b]);
        assert!(restore_from(round, pending).is_ok());

        let garbage = TestEngine::restore(
            config(),
            &[1, 2, 3],
            MockVrfCoordinator::new(),
            InMemoryLedger::new(),
            ManualClock::new(0),
        );
        assert!(matches!(garbage, Err(RaffleError::InvalidState)));
    }
}
