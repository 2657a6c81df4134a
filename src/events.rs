use crate::state::ParticipantId;
use crate::vrf::RequestId;
use borsh::{BorshDeserialize, BorshSerialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Notifications emitted at the point of each state change
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    EntryAccepted {
        participant: ParticipantId,
        amount: u64,
    },
    SelectionStarted {
        request_id: RequestId,
    },
    WinnerPicked {
        winner: ParticipantId,
        amount: u64,
        request_id: RequestId,
        round_index: u64,
    },
}

/// Observer of raffle events. Called synchronously, nothing is queued.
///
/// Sinks run while the engine is borrowed, and under the `SharedRaffle`
/// lock when driven through one. A sink must not call back into the
/// engine or the same `SharedRaffle`; doing so deadlocks.
pub trait EventSink: Send {
    fn emit(&self, event: &RaffleEvent);
}

impl<F> EventSink for F
where
    F: Fn(&RaffleEvent) + Send,
{
    fn emit(&self, event: &RaffleEvent) {
        self(event)
    }
}

/// Sink that records every event it sees
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<RaffleEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RaffleEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last(&self) -> Option<RaffleEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: &RaffleEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
