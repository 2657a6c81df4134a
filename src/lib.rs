// Raffle Engine
// Periodic, oracle-randomized winner selection over a pool of entries

// Round state and entry pool
pub mod error;
pub mod state;
pub mod config;
pub mod clock;

// Selection state machine and its collaborators
pub mod engine;
pub mod events;
pub mod ledger;
pub mod vrf;

// Wire interface
pub mod instruction;
pub mod processor;
pub mod shared;

// Development collaborators
pub mod mock;

pub use config::{RaffleConfig, VrfRequestConfig};
pub use engine::{RaffleEngine, UpkeepStatus};
pub use error::{ConfigError, LedgerError, OracleError, RaffleError};
pub use events::{EventLog, EventSink, RaffleEvent};
pub use shared::SharedRaffle;
pub use state::{ParticipantId, RaffleState};
pub use vrf::{RandomValue, RandomnessOracle, RequestId};
