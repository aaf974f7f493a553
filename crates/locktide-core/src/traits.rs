//! Trait interfaces between the ledgers and their collaborators.
//!
//! - [`TokenLedger`] — fungible-token balances and transfers (host implements)
//! - [`WeightSource`] — historical lock weights (the lock ledger implements,
//!   the fee ledger consumes)

use crate::clock::EpochClock;
use crate::error::TokenError;
use crate::types::{Address, Amount, Epoch, TokenId};

/// Standard fungible-token operations.
///
/// Implementations must either complete a transfer in full or fail without
/// moving anything. A token may deliver less than the requested amount (a
/// transfer fee, for example); callers that care measure balances around
/// the call.
pub trait TokenLedger {
    /// Balance of `account` in `token`.
    fn balance_of(&self, token: &TokenId, account: &Address) -> Amount;

    /// Move `amount` of `token` from `from` to `to`, authorized by `from`.
    fn transfer(
        &mut self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError>;

    /// Move `amount` of `token` from `from` to `to` using the allowance
    /// `from` granted to `spender`.
    fn transfer_from(
        &mut self,
        token: &TokenId,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError>;
}

/// Read-only view of per-epoch lock weights.
pub trait WeightSource {
    /// Clock the weights are indexed by.
    fn epoch_clock(&self) -> &EpochClock;

    /// `(account weight, total weight)` scheduled for `epoch`.
    fn weights_at(&self, account: &Address, epoch: Epoch) -> (Amount, Amount);
}
