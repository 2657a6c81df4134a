use thiserror::Error;

/// Errors that may be returned by the raffle engine
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Contribution is below the minimum entry amount
    #[error("Not enough stake to enter the raffle")]
    InsufficientStake,

    /// Entries are only accepted while the raffle is open
    #[error("Raffle is not open")]
    RoundNotOpen,

    /// Selection was triggered while the upkeep conditions do not hold
    #[error("Upkeep not needed")]
    UpkeepNotReady,

    /// Fulfillment for a request id that is not outstanding
    #[error("Unknown or already fulfilled randomness request")]
    UnknownRequest,

    /// The ledger rejected the prize transfer, round left calculating
    #[error("Payout to winner failed: {0}")]
    PayoutFailed(#[source] LedgerError),

    /// Contribution would overflow the pool or a participant stake
    #[error("Amount overflow")]
    AmountOverflow,

    /// The oracle refused the randomness request
    #[error("Randomness request failed: {0}")]
    OracleRequestFailed(#[source] OracleError),

    /// Fulfillment carried no random word
    #[error("No random words in fulfillment")]
    NoRandomWords,

    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstruction,

    /// Persisted engine state could not be restored
    #[error("Invalid engine state")]
    InvalidState,
}

/// Failures reported by the payout ledger
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("recipient account is frozen")]
    AccountFrozen,

    #[error("transfer rejected")]
    Rejected,
}

/// Failures reported by the randomness oracle
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("subscription not funded")]
    SubscriptionNotFunded,

    #[error("oracle unavailable")]
    Unavailable,

    #[error("nonexistent request")]
    NonexistentRequest,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Minimum entry amount must be greater than zero")]
    ZeroEntryAmount,

    #[error("Number of random words must be greater than zero")]
    ZeroNumWords,

    #[error("Invalid value for {key}")]
    InvalidValue { key: &'static str },

    #[error("Gas lane must be 32 hex encoded bytes")]
    InvalidGasLane,
}
