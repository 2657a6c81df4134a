//! In-memory collaborators for development networks and tests: a VRF
//! coordinator that is fulfilled by hand, a balance ledger and a
//! settable clock. All of them are cheap handles over shared state, so
//! a test can keep one clone while the engine owns another.

use crate::clock::{Clock, UnixTimestamp};
use crate::config::VrfRequestConfig;
use crate::error::{LedgerError, OracleError};
use crate::ledger::Ledger;
use crate::state::ParticipantId;
use crate::vrf::{RandomValue, RandomnessOracle, RequestId};
use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct CoordinatorInner {
    funded: bool,
    next_request_id: u64,
    pending: BTreeMap<RequestId, VrfRequestConfig>,
    overrides: HashMap<RequestId, RandomValue>,
    last_config: Option<VrfRequestConfig>,
}

/// VRF coordinator mock. Request ids start at 1.
#[derive(Clone, Debug)]
pub struct MockVrfCoordinator {
    inner: Arc<Mutex<CoordinatorInner>>,
}

impl Default for MockVrfCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVrfCoordinator {
    /// Coordinator with a funded subscription
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CoordinatorInner {
                funded: true,
                next_request_id: 1,
                pending: BTreeMap::new(),
                overrides: HashMap::new(),
                last_config: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_funded(&self, funded: bool) {
        self.lock().funded = funded;
    }

    /// Requests issued but not fulfilled yet
    pub fn pending_requests(&self) -> Vec<RequestId> {
        self.lock().pending.keys().copied().collect()
    }

    pub fn last_request_id(&self) -> Option<RequestId> {
        self.lock().pending.keys().next_back().copied()
    }

    /// Parameters of the most recent request, as received
    pub fn last_config(&self) -> Option<VrfRequestConfig> {
        self.lock().last_config.clone()
    }

    /// Use `value` instead of the generated word when `request_id` is fulfilled
    pub fn set_random_word(&self, request_id: RequestId, value: RandomValue) {
        self.lock().overrides.insert(request_id, value);
    }

    /// Consume a pending request and produce its random words.
    /// Fails for ids never issued or already fulfilled.
    pub fn fulfill_random_words(&self, request_id: RequestId) -> Result<Vec<RandomValue>, OracleError> {
        let mut inner = self.lock();
        let config = inner
            .pending
            .remove(&request_id)
            .ok_or(OracleError::NonexistentRequest)?;
        let first = inner.overrides.remove(&request_id);

        let words = (0..config.num_words)
            .map(|i| match (i, first) {
                (0, Some(value)) => value,
                _ => generated_word(request_id, i),
            })
            .collect();
        debug!("Fulfilling request {}", request_id);
        Ok(words)
    }

    /// Consume a pending request with a caller-chosen word
    pub fn fulfill_with(&self, request_id: RequestId, value: RandomValue) -> Result<RandomValue, OracleError> {
        self.set_random_word(request_id, value);
        let words = self.fulfill_random_words(request_id)?;
        words.first().copied().ok_or(OracleError::NonexistentRequest)
    }
}

impl RandomnessOracle for MockVrfCoordinator {
    fn request_random_words(&mut self, config: &VrfRequestConfig) -> Result<RequestId, OracleError> {
        let mut inner = self.lock();
        if !inner.funded {
            return Err(OracleError::SubscriptionNotFunded);
        }

        let request_id = RequestId(inner.next_request_id);
        inner.next_request_id += 1;
        inner.pending.insert(request_id, config.clone());
        inner.last_config = Some(config.clone());
        debug!("Random words requested: request={}", request_id);
        Ok(request_id)
    }
}

// splitmix64 over (request id, word index)
fn generated_word(request_id: RequestId, index: u32) -> RandomValue {
    let mut state = request_id.0 ^ ((index as u64) << 32);
    let mut bytes = [0u8; 32];
    for chunk in bytes.chunks_mut(8) {
        state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^= z >> 31;
        chunk.copy_from_slice(&z.to_be_bytes());
    }
    RandomValue::from_be_bytes(bytes)
}

#[derive(Debug, Default)]
struct LedgerInner {
    balances: HashMap<ParticipantId, u64>,
    frozen: HashSet<ParticipantId>,
    reject_remaining: u32,
    reject_with: Option<LedgerError>,
    payouts: u64,
}

/// Simple balance ledger credited by payouts
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedger {
    inner: Arc<Mutex<LedgerInner>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn balance_of(&self, account: &ParticipantId) -> u64 {
        self.lock().balances.get(account).copied().unwrap_or_default()
    }

    /// Number of successful payouts
    pub fn payout_count(&self) -> u64 {
        self.lock().payouts
    }

    /// Fail the next `count` payouts with `error`
    pub fn reject_next(&self, count: u32, error: LedgerError) {
        let mut inner = self.lock();
        inner.reject_remaining = count;
        inner.reject_with = Some(error);
    }

    pub fn freeze(&self, account: ParticipantId) {
        self.lock().frozen.insert(account);
    }

    pub fn unfreeze(&self, account: &ParticipantId) {
        self.lock().frozen.remove(account);
    }
}

impl Ledger for InMemoryLedger {
    fn payout(&mut self, recipient: &ParticipantId, amount: u64) -> Result<(), LedgerError> {
        let mut inner = self.lock();
        if inner.reject_remaining > 0 {
            inner.reject_remaining -= 1;
            return Err(inner.reject_with.unwrap_or(LedgerError::Rejected));
        }
        if inner.frozen.contains(recipient) {
            return Err(LedgerError::AccountFrozen);
        }

        let balance = inner.balances.entry(*recipient).or_default();
        *balance = balance.checked_add(amount).ok_or(LedgerError::Rejected)?;
        inner.payouts += 1;
        Ok(())
    }
}

/// Clock that only moves when told to
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: UnixTimestamp) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }

    pub fn set(&self, timestamp: UnixTimestamp) {
        self.now.store(timestamp, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn unix_timestamp(&self) -> UnixTimestamp {
        self.now.load(Ordering::SeqCst)
    }
}
