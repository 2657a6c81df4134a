// Randomness oracle boundary and request correlation
use crate::clock::UnixTimestamp;
use crate::config::VrfRequestConfig;
use crate::error::{OracleError, RaffleError};
use crate::state::RoundSnapshot;
use arrayref::array_refs;
use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt;

/// Oracle-issued identifier of a randomness request
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 256-bit unsigned random word, big-endian
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RandomValue(pub [u8; 32]);

impl RandomValue {
    pub const fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_be_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl From<u64> for RandomValue {
    fn from(value: u64) -> Self {
        Self::from(value as u128)
    }
}

impl From<u128> for RandomValue {
    fn from(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[16..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Debug for RandomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// External randomness oracle. Fulfillment arrives later, out of band,
/// through [`crate::engine::RaffleEngine::resolve`].
pub trait RandomnessOracle {
    fn request_random_words(&mut self, config: &VrfRequestConfig) -> Result<RequestId, OracleError>;
}

/// Reduce a full-width random word to a slot index.
///
/// The word is folded 64 bits at a time so the result is the exact
/// remainder of the 256-bit value, not of a truncated prefix.
pub fn winner_index(random_value: &RandomValue, slots: usize) -> usize {
    if slots == 0 {
        return 0;
    }

    let modulus = slots as u128;
    let (a, b, c, d) = array_refs![&random_value.0, 8, 8, 8, 8];
    let remainder = [a, b, c, d].iter().fold(0u128, |rem, limb| {
        ((rem << 64) | u64::from_be_bytes(**limb) as u128) % modulus
    });
    remainder as usize
}

/// An in-flight randomness request and the round it was issued for
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub snapshot: RoundSnapshot,
    pub requested_at: UnixTimestamp,
}

/// Correlation table between request ids and the rounds waiting on them
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct PendingRequests {
    capacity: u32,
    entries: Vec<PendingRequest>,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::with_capacity(1)
    }
}

impl PendingRequests {
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            capacity,
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, request: PendingRequest) -> Result<(), RaffleError> {
        if self.is_full() || self.get(&request.request_id).is_some() {
            return Err(RaffleError::UpkeepNotReady);
        }
        self.entries.push(request);
        Ok(())
    }

    pub fn get(&self, request_id: &RequestId) -> Option<&PendingRequest> {
        self.entries.iter().find(|r| r.request_id == *request_id)
    }

    pub fn remove(&mut self, request_id: &RequestId) -> Option<PendingRequest> {
        let position = self.entries.iter().position(|r| r.request_id == *request_id)?;
        Some(self.entries.remove(position))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity as usize
    }
}
