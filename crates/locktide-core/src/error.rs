//! Error types for the Locktide ledgers.
use thiserror::Error;

use crate::types::{Address, Amount, Epoch};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("amount must be non-zero")] ZeroAmount,
    #[error("invalid lock duration: {weeks} weeks (allowed 1..={max})")] InvalidDuration { weeks: u64, max: u64 },
    #[error("extension target {to} must exceed current duration {from}")] NonIncreasingExtension { from: u64, to: u64 },
    #[error("unlock bucket at epoch {epoch} holds {available}, requested {requested}")] UnlockUnderflow { epoch: Epoch, available: Amount, requested: Amount },
    #[error("no matured balance to withdraw")] NothingMatured,
    #[error("weight overflow")] WeightOverflow,
    #[error("balance overflow")] BalanceOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("amount must be non-zero")] ZeroAmount,
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error("weight source clock does not match fee ledger clock")] ClockMismatch,
    #[error("checkpoint epoch {checkpoint} is ahead of last closed epoch {last_closed}")] CheckpointAhead { checkpoint: Epoch, last_closed: Epoch },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: Amount, need: Amount },
    #[error("insufficient allowance: have {have}, need {need}")] InsufficientAllowance { have: Amount, need: Amount },
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("engine is not configured")] NotConfigured,
    #[error("engine is already configured")] AlreadyConfigured,
    #[error("caller {0} may not configure the engine")] Unauthorized(String),
    #[error("invalid config: {0}")] InvalidConfig(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("epoch duration must be non-zero")] ZeroDuration,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid length: {0} bytes")] InvalidLength(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)] Lock(#[from] LockError),
    #[error(transparent)] Fee(#[from] FeeError),
    #[error(transparent)] Token(#[from] TokenError),
    #[error(transparent)] Bootstrap(#[from] BootstrapError),
    #[error(transparent)] Clock(#[from] ClockError),
    #[error("timestamp {now} is before last seen {last}")] TimeRegression { last: u64, now: u64 },
    #[error("vault holds {have} of token {token}, needs {need}")] VaultShortfall { token: Address, have: Amount, need: Amount },
    #[error("snapshot: {0}")] Snapshot(String),
}
