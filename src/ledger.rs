use crate::error::LedgerError;
use crate::state::ParticipantId;

/// External ledger that settles the prize.
///
/// Must report failure synchronously: the engine only commits the round
/// reset after `payout` returned `Ok`.
pub trait Ledger {
    fn payout(&mut self, recipient: &ParticipantId, amount: u64) -> Result<(), LedgerError>;
}
