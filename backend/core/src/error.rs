use thiserror::Error;

/// Top-level error type for the voxledger engine.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger actor is not running: {0}")]
    ActorClosed(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid date key {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
}
