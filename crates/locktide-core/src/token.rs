//! In-memory token ledger.
//!
//! [`MemoryTokenLedger`] keeps balances and allowances in `HashMap`s with no
//! persistence. It backs tests and the scenario simulator. Tokens can be
//! given a transfer fee (burned on every transfer) to model tokens that
//! deliver less than the requested amount.

use std::collections::HashMap;

use tracing::debug;

use crate::constants::BPS_PRECISION;
use crate::error::TokenError;
use crate::traits::TokenLedger;
use crate::types::{Address, Amount, TokenId};

/// HashMap-backed [`TokenLedger`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenLedger {
    /// (token, account) → balance.
    balances: HashMap<(TokenId, Address), Amount>,
    /// (token, owner, spender) → remaining allowance.
    allowances: HashMap<(TokenId, Address, Address), Amount>,
    /// token → fee in basis points burned from each transfer.
    transfer_fee_bps: HashMap<TokenId, u64>,
    /// token → total supply.
    supply: HashMap<TokenId, Amount>,
}

impl MemoryTokenLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `token` to `account` out of thin air.
    pub fn mint(
        &mut self,
        token: &TokenId,
        account: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let supply = self.supply.entry(*token).or_default();
        *supply = supply.checked_add(amount).ok_or(TokenError::ArithmeticOverflow)?;
        let bal = self.balances.entry((*token, *account)).or_default();
        *bal = bal.checked_add(amount).ok_or(TokenError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Set the allowance `owner` grants `spender` for `token`.
    pub fn approve(&mut self, token: &TokenId, owner: &Address, spender: &Address, amount: Amount) {
        self.allowances.insert((*token, *owner, *spender), amount);
    }

    /// Remaining allowance `owner` grants `spender` for `token`.
    pub fn allowance(&self, token: &TokenId, owner: &Address, spender: &Address) -> Amount {
        *self.allowances.get(&(*token, *owner, *spender)).unwrap_or(&0)
    }

    /// Burn `bps` basis points of every transfer of `token`.
    pub fn set_transfer_fee_bps(&mut self, token: &TokenId, bps: u64) {
        self.transfer_fee_bps.insert(*token, bps.min(BPS_PRECISION));
    }

    /// Total supply of `token`, after burns.
    pub fn total_supply(&self, token: &TokenId) -> Amount {
        *self.supply.get(token).unwrap_or(&0)
    }

    fn move_balance(
        &mut self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let have = self.balance_of(token, from);
        if have < amount {
            return Err(TokenError::InsufficientBalance { have, need: amount });
        }
        let bps = *self.transfer_fee_bps.get(token).unwrap_or(&0);
        let fee = amount
            .checked_mul(bps as u128)
            .ok_or(TokenError::ArithmeticOverflow)?
            / BPS_PRECISION as u128;
        let delivered = amount - fee;

        let recipient = self.balance_of(token, to);
        if from != to {
            recipient
                .checked_add(delivered)
                .ok_or(TokenError::ArithmeticOverflow)?;
        }

        self.balances.insert((*token, *from), have - amount);
        let recipient = self.balance_of(token, to);
        self.balances.insert((*token, *to), recipient + delivered);
        if fee > 0 {
            let supply = self.supply.entry(*token).or_default();
            *supply = supply.saturating_sub(fee);
        }
        debug!(%token, %from, %to, amount, fee, "token: transfer");
        Ok(())
    }
}

impl TokenLedger for MemoryTokenLedger {
    fn balance_of(&self, token: &TokenId, account: &Address) -> Amount {
        *self.balances.get(&(*token, *account)).unwrap_or(&0)
    }

    fn transfer(
        &mut self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.move_balance(token, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: &TokenId,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let allowed = self.allowance(token, from, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance { have: allowed, need: amount });
        }
        self.move_balance(token, from, to, amount)?;
        self.allowances.insert((*token, *from, *spender), allowed - amount);
        Ok(())
    }
}
