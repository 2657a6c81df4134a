use crate::clock::UnixTimestamp;
use crate::error::RaffleError;
use borsh::{BorshDeserialize, BorshSerialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a raffle participant (32 byte account key)
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(pub [u8; 32]);

impl ParticipantId {
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Distinct id per call, for tests and local runs
    pub fn new_unique() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl AsRef<[u8]> for ParticipantId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Status of the raffle
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Raffle is open for entries
    Open,
    /// Randomness requested, entries blocked until the winner is paid
    Calculating,
}

impl TryFrom<u8> for RaffleState {
    type Error = &'static str;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(RaffleState::Open),
            1 => Ok(RaffleState::Calculating),
            _ => Err("Invalid raffle state"),
        }
    }
}

impl From<RaffleState> for u8 {
    fn from(state: RaffleState) -> Self {
        match state {
            RaffleState::Open => 0,
            RaffleState::Calculating => 1,
        }
    }
}

/// Entrants and stake collected for the current round
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryPool {
    /// One slot per entry, in entry order
    entrants: Vec<ParticipantId>,
    /// Cumulative contribution per participant
    stakes: BTreeMap<ParticipantId, u64>,
    pool_total: u64,
}

impl EntryPool {
    /// Append one lottery slot. Nothing is written unless both sums fit.
    pub fn add_entry(&mut self, participant: ParticipantId, amount: u64) -> Result<(), RaffleError> {
        let pool_total = self
            .pool_total
            .checked_add(amount)
            .ok_or(RaffleError::AmountOverflow)?;
        let stake = self
            .stake_of(&participant)
            .checked_add(amount)
            .ok_or(RaffleError::AmountOverflow)?;

        self.entrants.push(participant);
        self.stakes.insert(participant, stake);
        self.pool_total = pool_total;
        Ok(())
    }

    /// Immutable copy of the slots and pool taken when selection begins
    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            entrants: self.entrants.clone(),
            pool_total: self.pool_total,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.entrants.clear();
        self.stakes.clear();
        self.pool_total = 0;
    }

    pub fn entrants(&self) -> &[ParticipantId] {
        &self.entrants
    }

    pub fn player(&self, index: usize) -> Option<ParticipantId> {
        self.entrants.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.entrants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entrants.is_empty()
    }

    pub fn pool_total(&self) -> u64 {
        self.pool_total
    }

    pub fn stake_of(&self, participant: &ParticipantId) -> u64 {
        self.stakes.get(participant).copied().unwrap_or_default()
    }

    /// Stakes sum to the pool total and cover exactly the entrants
    pub fn is_consistent(&self) -> bool {
        let total = self
            .stakes
            .values()
            .try_fold(0u64, |sum, stake| sum.checked_add(*stake));
        total == Some(self.pool_total)
            && self.entrants.iter().all(|p| self.stakes.contains_key(p))
            && self.stakes.keys().all(|p| self.entrants.contains(p))
    }
}

/// Entrants and pool frozen at the instant selection began
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RoundSnapshot {
    pub entrants: Vec<ParticipantId>,
    pub pool_total: u64,
}

/// The current selection epoch, reset in place after every payout
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Round {
    pub state: RaffleState,
    pub pool: EntryPool,
    /// Start of the round: engine start or the last payout
    pub last_resolution_timestamp: UnixTimestamp,
    /// Winner of the previous round
    pub recent_winner: Option<ParticipantId>,
    /// Sequential round number (1, 2, 3, ...)
    pub round_index: u64,
}

impl Round {
    pub fn new(start_time: UnixTimestamp) -> Self {
        Self {
            state: RaffleState::Open,
            pool: EntryPool::default(),
            last_resolution_timestamp: start_time,
            recent_winner: None,
            round_index: 1,
        }
    }

    /// Gate and record an entry
    pub fn enter(
        &mut self,
        participant: ParticipantId,
        amount: u64,
        minimum_entry_amount: u64,
    ) -> Result<(), RaffleError> {
        if amount < minimum_entry_amount {
            return Err(RaffleError::InsufficientStake);
        }
        if self.state != RaffleState::Open {
            return Err(RaffleError::RoundNotOpen);
        }
        self.pool.add_entry(participant, amount)
    }

    /// Seconds since the round started, zero if the clock went backwards
    pub fn elapsed(&self, now: UnixTimestamp) -> u64 {
        u64::try_from(now.saturating_sub(self.last_resolution_timestamp)).unwrap_or(0)
    }

    /// Close the round after the winner was paid and open the next one
    pub(crate) fn complete(&mut self, winner: ParticipantId, now: UnixTimestamp) {
        self.pool.reset();
        self.recent_winner = Some(winner);
        self.last_resolution_timestamp = now;
        self.round_index = self.round_index.saturating_add(1);
        self.state = RaffleState::Open;
    }
}
