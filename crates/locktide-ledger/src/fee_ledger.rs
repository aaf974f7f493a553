//! Fee ledger: per-epoch fee totals and streamed pro-rata claims.
//!
//! Fees deposited during epoch `e` are owed to accounts in proportion to
//! their share of the total lock weight at `e`. They start vesting at the
//! start of `e + 1` and are fully vested at the start of `e + 2`.
//!
//! For each `(account, token)` only one [`FeeStream`] checkpoint is kept:
//! the share of the last epoch the account claimed against. A claim pays
//! the checkpoint's unpaid remainder once its window has elapsed, the full
//! share of every deposit epoch skipped since, and the vested part of the
//! last closed epoch.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use locktide_core::clock::EpochClock;
use locktide_core::error::FeeError;
use locktide_core::math::{linear_vested, mul_div};
use locktide_core::traits::WeightSource;
use locktide_core::types::{Address, Amount, Epoch, FeeStream, TokenId};

use crate::series::EpochSeries;

/// Computed claim for one token, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeClaim {
    token: TokenId,
    payable: Amount,
    /// Replacement checkpoint; `None` leaves the stored one untouched.
    checkpoint: Option<FeeStream>,
}

impl FeeClaim {
    pub fn token(&self) -> &TokenId {
        &self.token
    }

    pub fn payable(&self) -> Amount {
        self.payable
    }

    pub fn checkpoint(&self) -> Option<&FeeStream> {
        self.checkpoint.as_ref()
    }
}

/// Fee deposits and claim checkpoints for every fee token.
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct FeeLedger {
    clock: EpochClock,
    /// Tokens in the order they were first deposited.
    tokens: Vec<TokenId>,
    deposits: HashMap<TokenId, EpochSeries>,
    checkpoints: HashMap<(Address, TokenId), FeeStream>,
}

impl FeeLedger {
    /// Create a fee ledger on the clock shared with the lock ledger.
    pub fn new(clock: EpochClock) -> Self {
        Self {
            clock,
            tokens: Vec::new(),
            deposits: HashMap::new(),
            checkpoints: HashMap::new(),
        }
    }

    pub fn clock(&self) -> &EpochClock {
        &self.clock
    }

    // --- deposits ---

    /// Check that recording up to `amount` more of `token` at `now` cannot
    /// overflow.
    pub fn check_deposit(&self, token: &TokenId, amount: Amount, now: u64) -> Result<(), FeeError> {
        if amount == 0 {
            return Err(FeeError::ZeroAmount);
        }
        let epoch = self.clock.epoch_at(now);
        self.deposited(token, epoch)
            .checked_add(amount)
            .map(|_| ())
            .ok_or(FeeError::ArithmeticOverflow)
    }

    /// Add `received` of `token` to the current epoch's total, registering
    /// the token on first sight. Returns the epoch credited.
    pub fn record_deposit(
        &mut self,
        token: &TokenId,
        received: Amount,
        now: u64,
    ) -> Result<Epoch, FeeError> {
        let epoch = self.clock.epoch_at(now);
        let total = self
            .deposited(token, epoch)
            .checked_add(received)
            .ok_or(FeeError::ArithmeticOverflow)?;
        if !self.deposits.contains_key(token) {
            self.tokens.push(*token);
            debug!(%token, "fee: token registered");
        }
        self.deposits.entry(*token).or_default().set(epoch, total);
        Ok(epoch)
    }

    /// Total of `token` received during `epoch`.
    pub fn deposited(&self, token: &TokenId, epoch: Epoch) -> Amount {
        self.deposits.get(token).map_or(0, |s| s.get(epoch))
    }

    /// Registered fee tokens in registration order.
    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    pub fn checkpoint(&self, account: &Address, token: &TokenId) -> Option<&FeeStream> {
        self.checkpoints.get(&(*account, *token))
    }

    // --- claims ---

    /// `account`'s full share of `token` fees deposited in `epoch`.
    fn epoch_share(
        &self,
        weights: &dyn WeightSource,
        account: &Address,
        token: &TokenId,
        epoch: Epoch,
    ) -> Result<Amount, FeeError> {
        let fee = self.deposited(token, epoch);
        if fee == 0 {
            return Ok(0);
        }
        let (own, total) = weights.weights_at(account, epoch);
        if total == 0 {
            warn!(%token, epoch, fee, "fee: epoch has no lock weight, fees stranded");
            return Ok(0);
        }
        mul_div(fee, own, total).ok_or(FeeError::ArithmeticOverflow)
    }

    /// Vested part of `share` for fees of `epoch` at `now`.
    fn streamed(&self, share: Amount, epoch: Epoch, now: u64) -> Result<Amount, FeeError> {
        let vest_start = self.clock.epoch_start(epoch + 1);
        let elapsed = now.saturating_sub(vest_start);
        linear_vested(share, elapsed, self.clock.duration()).ok_or(FeeError::ArithmeticOverflow)
    }

    /// Compute what `account` can claim of `token` at `now` and the
    /// checkpoint that claim leaves behind. Does not mutate.
    pub fn plan_claim(
        &self,
        weights: &dyn WeightSource,
        account: &Address,
        token: &TokenId,
        now: u64,
    ) -> Result<FeeClaim, FeeError> {
        if weights.epoch_clock() != &self.clock {
            return Err(FeeError::ClockMismatch);
        }

        let current = self.clock.epoch_at(now);
        if current == 0 {
            return Ok(FeeClaim { token: *token, payable: 0, checkpoint: None });
        }
        let last_closed = current - 1;
        let stored = self.checkpoint(account, token).copied();

        let mut payable: Amount = 0;
        let first_skipped = match stored {
            Some(cp) if cp.epoch > last_closed => {
                return Err(FeeError::CheckpointAhead { checkpoint: cp.epoch, last_closed });
            }
            Some(cp) if cp.epoch == last_closed => {
                let share = self.epoch_share(weights, account, token, last_closed)?;
                let vested = self.streamed(share, last_closed, now)?.max(cp.claimed);
                return Ok(FeeClaim {
                    token: *token,
                    payable: vested - cp.claimed,
                    checkpoint: Some(FeeStream {
                        epoch: last_closed,
                        amount: share,
                        claimed: vested,
                    }),
                });
            }
            Some(cp) => {
                payable = cp.remaining();
                cp.epoch + 1
            }
            None => 0,
        };

        if let Some(series) = self.deposits.get(token) {
            for (epoch, _) in series.iter_range(first_skipped..last_closed) {
                let share = self.epoch_share(weights, account, token, epoch)?;
                payable = payable.checked_add(share).ok_or(FeeError::ArithmeticOverflow)?;
            }
        }

        let share = self.epoch_share(weights, account, token, last_closed)?;
        let vested = self.streamed(share, last_closed, now)?;
        payable = payable.checked_add(vested).ok_or(FeeError::ArithmeticOverflow)?;

        Ok(FeeClaim {
            token: *token,
            payable,
            checkpoint: Some(FeeStream { epoch: last_closed, amount: share, claimed: vested }),
        })
    }

    /// Store the checkpoint of a claim produced by [`plan_claim`](Self::plan_claim).
    pub fn commit_claim(&mut self, account: &Address, claim: FeeClaim) {
        if let Some(cp) = claim.checkpoint().copied() {
            debug!(
                %account,
                token = %claim.token,
                epoch = cp.epoch,
                share = cp.amount,
                claimed = cp.claimed,
                payable = claim.payable,
                "fee: checkpoint stored"
            );
            self.checkpoints.insert((*account, claim.token), cp);
        }
    }

    /// What `account` could claim of each of `tokens` at `now`, in order.
    pub fn claimable(
        &self,
        weights: &dyn WeightSource,
        account: &Address,
        tokens: &[TokenId],
        now: u64,
    ) -> Result<Vec<Amount>, FeeError> {
        tokens
            .iter()
            .map(|t| self.plan_claim(weights, account, t, now).map(|c| c.payable))
            .collect()
    }

    /// Plan a claim of each distinct token in `tokens`, first occurrence
    /// order preserved.
    pub fn plan_claims(
        &self,
        weights: &dyn WeightSource,
        account: &Address,
        tokens: &[TokenId],
        now: u64,
    ) -> Result<Vec<FeeClaim>, FeeError> {
        dedup_tokens(tokens)
            .iter()
            .map(|t| self.plan_claim(weights, account, t, now))
            .collect()
    }

    /// Claim every token in `tokens` at `now`, returning the payable amount
    /// per requested token. Repeats of a token already in the request pay
    /// zero. Token movement is the caller's concern.
    pub fn claim(
        &mut self,
        weights: &dyn WeightSource,
        account: &Address,
        tokens: &[TokenId],
        now: u64,
    ) -> Result<Vec<Amount>, FeeError> {
        let plans = self.plan_claims(weights, account, tokens, now)?;
        let paid = paid_per_request(tokens, &plans);
        for plan in plans {
            self.commit_claim(account, plan);
        }
        Ok(paid)
    }
}

/// Payable amount of `plans` reported against each requested token. Only
/// the first occurrence of a token reports its payout.
pub fn paid_per_request(tokens: &[TokenId], plans: &[FeeClaim]) -> Vec<Amount> {
    let paid: HashMap<TokenId, Amount> = plans.iter().map(|p| (p.token, p.payable)).collect();
    let mut seen = HashSet::new();
    tokens
        .iter()
        .map(|t| match paid.get(t) {
            Some(amount) if seen.insert(*t) => *amount,
            _ => 0,
        })
        .collect()
}

/// `tokens` with repeats removed, first occurrence order preserved.
pub fn dedup_tokens(tokens: &[TokenId]) -> Vec<TokenId> {
    let mut seen = HashSet::new();
    tokens.iter().copied().filter(|t| seen.insert(*t)).collect()
}
