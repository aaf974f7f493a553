//! Lock ledger: duration-weighted balances, unlock schedules, exit streams.
//!
//! Every lock of `amount` for `weeks` epochs contributes a triangular ramp
//! to the account and total weight series: `amount * weeks` in the lock's
//! first epoch, decreasing by `amount` each epoch, reaching zero at the
//! unlock epoch. Principal is recorded in the account's unlock series at the
//! unlock epoch. Individual locks are not tracked; only the aggregate series
//! are.
//!
//! Mutations are split into a `prepare_*` step, which validates and computes
//! every new value with checked arithmetic, and an infallible `commit_*`
//! step. A failed prepare leaves the ledger untouched.

use std::collections::HashMap;

use tracing::{debug, info};

use locktide_core::clock::EpochClock;
use locktide_core::error::LockError;
use locktide_core::math::linear_vested;
use locktide_core::traits::WeightSource;
use locktide_core::types::{Address, Amount, Epoch, ExitStream, UnlockBucket};

use crate::series::EpochSeries;

/// Per-account lock state.
#[derive(Debug, Clone, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
struct AccountLocks {
    /// Scheduled weight per epoch.
    weight: EpochSeries,
    /// Principal maturing per epoch.
    unlocks: EpochSeries,
    /// Last epoch whose matured principal was swept into an exit stream.
    withdrawn_until: Epoch,
    exit_stream: Option<ExitStream>,
}

/// Validated, fully computed lock or extension, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockPlan {
    account: Address,
    amount: Amount,
    from_weeks: u64,
    to_weeks: u64,
    start: Epoch,
    /// (epoch, new account weight, new total weight)
    weights: Vec<(Epoch, Amount, Amount)>,
    /// (epoch, new unlock value)
    unlocks: Vec<(Epoch, Amount)>,
}

impl LockPlan {
    pub fn account(&self) -> &Address {
        &self.account
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Previous duration; zero for a fresh lock.
    pub fn from_weeks(&self) -> u64 {
        self.from_weeks
    }

    pub fn to_weeks(&self) -> u64 {
        self.to_weeks
    }

    /// Epoch at which the principal now matures.
    pub fn unlock_epoch(&self) -> Epoch {
        self.start + self.to_weeks
    }

    pub fn is_extension(&self) -> bool {
        self.from_weeks > 0
    }
}

/// Validated exit-stream initiation, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitPlan {
    account: Address,
    matured: Amount,
    stream: ExitStream,
    withdrawn_until: Epoch,
}

impl ExitPlan {
    /// Principal swept from matured unlock buckets.
    pub fn matured(&self) -> Amount {
        self.matured
    }

    /// The stream that will replace any existing one.
    pub fn stream(&self) -> &ExitStream {
        &self.stream
    }
}

/// Computed exit-stream payout, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitWithdrawal {
    account: Address,
    payout: Amount,
    /// Stream state after the payout; `None` clears the stream.
    next: Option<ExitStream>,
}

impl ExitWithdrawal {
    pub fn payout(&self) -> Amount {
        self.payout
    }

    /// Whether this payout completes the stream.
    pub fn closes_stream(&self) -> bool {
        self.next.is_none()
    }
}

/// Weight and unlock accounting for all accounts.
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct LockLedger {
    clock: EpochClock,
    max_lock_weeks: u64,
    total_weight: EpochSeries,
    accounts: HashMap<Address, AccountLocks>,
}

/// Weight a lock of `amount` with `weeks` remaining at its start contributes
/// `offset` epochs later.
fn ramp(amount: Amount, weeks: u64, offset: u64) -> Result<Amount, LockError> {
    if offset >= weeks {
        return Ok(0);
    }
    amount
        .checked_mul((weeks - offset) as u128)
        .ok_or(LockError::WeightOverflow)
}

impl LockLedger {
    /// Create an empty ledger on `clock` accepting locks of up to
    /// `max_lock_weeks` epochs.
    pub fn new(clock: EpochClock, max_lock_weeks: u64) -> Self {
        Self {
            clock,
            max_lock_weeks,
            total_weight: EpochSeries::new(),
            accounts: HashMap::new(),
        }
    }

    pub fn clock(&self) -> &EpochClock {
        &self.clock
    }

    pub fn max_lock_weeks(&self) -> u64 {
        self.max_lock_weeks
    }

    // --- weight updates ---

    /// New `(epoch, account, total)` values for replacing an `old_weeks` ramp
    /// with a `new_weeks` ramp of `amount` starting at `start`.
    fn plan_weights(
        &self,
        account: &Address,
        start: Epoch,
        amount: Amount,
        new_weeks: u64,
        old_weeks: u64,
    ) -> Result<Vec<(Epoch, Amount, Amount)>, LockError> {
        let own = self.accounts.get(account).map(|a| &a.weight);
        let span = new_weeks.max(old_weeks);
        let mut writes = Vec::new();

        for offset in 0..span {
            let epoch = start.checked_add(offset).ok_or(LockError::WeightOverflow)?;
            let new = ramp(amount, new_weeks, offset)?;
            let old = ramp(amount, old_weeks, offset)?;
            if new == old {
                continue;
            }
            let apply = |current: Amount| {
                current
                    .checked_add(new)
                    .and_then(|v| v.checked_sub(old))
                    .ok_or(LockError::WeightOverflow)
            };
            let user = apply(own.map_or(0, |s| s.get(epoch)))?;
            let total = apply(self.total_weight.get(epoch))?;
            writes.push((epoch, user, total));
        }

        Ok(writes)
    }

    fn check_duration(&self, weeks: u64) -> Result<(), LockError> {
        if weeks == 0 || weeks > self.max_lock_weeks {
            return Err(LockError::InvalidDuration { weeks, max: self.max_lock_weeks });
        }
        Ok(())
    }

    fn unlock_value(&self, account: &Address, epoch: Epoch) -> Amount {
        self.accounts
            .get(account)
            .map_or(0, |a| a.unlocks.get(epoch))
    }

    /// Validate and compute a fresh lock of `amount` for `weeks` epochs.
    pub fn prepare_lock(
        &self,
        account: &Address,
        amount: Amount,
        weeks: u64,
        now: u64,
    ) -> Result<LockPlan, LockError> {
        if amount == 0 {
            return Err(LockError::ZeroAmount);
        }
        self.check_duration(weeks)?;

        let start = self.clock.epoch_at(now);
        let unlock_epoch = start.checked_add(weeks).ok_or(LockError::WeightOverflow)?;
        let unlocked = self
            .unlock_value(account, unlock_epoch)
            .checked_add(amount)
            .ok_or(LockError::BalanceOverflow)?;
        let weights = self.plan_weights(account, start, amount, weeks, 0)?;

        Ok(LockPlan {
            account: *account,
            amount,
            from_weeks: 0,
            to_weeks: weeks,
            start,
            weights,
            unlocks: vec![(unlock_epoch, unlocked)],
        })
    }

    /// Validate and compute moving `amount` from the bucket maturing
    /// `from_weeks` from now to the one maturing `to_weeks` from now.
    pub fn prepare_extend(
        &self,
        account: &Address,
        amount: Amount,
        from_weeks: u64,
        to_weeks: u64,
        now: u64,
    ) -> Result<LockPlan, LockError> {
        if amount == 0 {
            return Err(LockError::ZeroAmount);
        }
        if from_weeks == 0 {
            return Err(LockError::InvalidDuration { weeks: from_weeks, max: self.max_lock_weeks });
        }
        self.check_duration(to_weeks)?;
        if to_weeks <= from_weeks {
            return Err(LockError::NonIncreasingExtension { from: from_weeks, to: to_weeks });
        }

        let start = self.clock.epoch_at(now);
        let from_epoch = start.checked_add(from_weeks).ok_or(LockError::WeightOverflow)?;
        let to_epoch = start.checked_add(to_weeks).ok_or(LockError::WeightOverflow)?;

        let available = self.unlock_value(account, from_epoch);
        let remaining = available.checked_sub(amount).ok_or(LockError::UnlockUnderflow {
            epoch: from_epoch,
            available,
            requested: amount,
        })?;
        let moved = self
            .unlock_value(account, to_epoch)
            .checked_add(amount)
            .ok_or(LockError::BalanceOverflow)?;
        let weights = self.plan_weights(account, start, amount, to_weeks, from_weeks)?;

        Ok(LockPlan {
            account: *account,
            amount,
            from_weeks,
            to_weeks,
            start,
            weights,
            unlocks: vec![(from_epoch, remaining), (to_epoch, moved)],
        })
    }

    /// Apply a plan produced by [`prepare_lock`](Self::prepare_lock) or
    /// [`prepare_extend`](Self::prepare_extend) against the current state.
    pub fn commit_lock(&mut self, plan: LockPlan) {
        let entry = self.accounts.entry(plan.account).or_default();
        for &(epoch, user, total) in &plan.weights {
            entry.weight.set(epoch, user);
            self.total_weight.set(epoch, total);
        }
        for &(epoch, value) in &plan.unlocks {
            entry.unlocks.set(epoch, value);
        }
        if plan.is_extension() {
            info!(
                account = %plan.account,
                amount = plan.amount,
                from_weeks = plan.from_weeks,
                to_weeks = plan.to_weeks,
                "lock: extended"
            );
        } else {
            info!(
                account = %plan.account,
                amount = plan.amount,
                weeks = plan.to_weeks,
                unlock_epoch = plan.unlock_epoch(),
                "lock: created"
            );
        }
        debug!(epochs_written = plan.weights.len(), "lock: weight series updated");
    }

    /// Lock `amount` for `weeks` epochs. Returns the unlock epoch.
    pub fn lock(
        &mut self,
        account: &Address,
        amount: Amount,
        weeks: u64,
        now: u64,
    ) -> Result<Epoch, LockError> {
        let plan = self.prepare_lock(account, amount, weeks, now)?;
        let unlock_epoch = plan.unlock_epoch();
        self.commit_lock(plan);
        Ok(unlock_epoch)
    }

    /// Move `amount` from the `from_weeks` bucket to the `to_weeks` bucket.
    ///
    /// The caller must own at least `amount` in the `from_weeks` bucket;
    /// that bucket is the only check against over-extension.
    pub fn extend_lock(
        &mut self,
        account: &Address,
        amount: Amount,
        from_weeks: u64,
        to_weeks: u64,
        now: u64,
    ) -> Result<(), LockError> {
        let plan = self.prepare_extend(account, amount, from_weeks, to_weeks, now)?;
        self.commit_lock(plan);
        Ok(())
    }

    // --- exit streams ---

    /// Validate and compute sweeping matured principal into a new stream.
    pub fn prepare_exit_stream(&self, account: &Address, now: u64) -> Result<ExitPlan, LockError> {
        let current = self.clock.epoch_at(now);
        let acct = self.accounts.get(account).ok_or(LockError::NothingMatured)?;
        if current <= acct.withdrawn_until {
            return Err(LockError::NothingMatured);
        }

        let matured = acct
            .unlocks
            .sum_range(acct.withdrawn_until + 1..=current)
            .ok_or(LockError::BalanceOverflow)?;
        if matured == 0 {
            return Err(LockError::NothingMatured);
        }

        let carried = acct.exit_stream.map_or(0, |s| s.remaining());
        let amount = matured.checked_add(carried).ok_or(LockError::BalanceOverflow)?;

        Ok(ExitPlan {
            account: *account,
            matured,
            stream: ExitStream { start: now, amount, claimed: 0 },
            withdrawn_until: current,
        })
    }

    pub fn commit_exit_stream(&mut self, plan: ExitPlan) {
        let entry = self.accounts.entry(plan.account).or_default();
        entry.withdrawn_until = plan.withdrawn_until;
        entry.exit_stream = Some(plan.stream);
        info!(
            account = %plan.account,
            matured = plan.matured,
            stream_amount = plan.stream.amount,
            withdrawn_until = plan.withdrawn_until,
            "exit: stream initiated"
        );
    }

    /// Sweep matured principal into a stream vesting over the next epoch.
    /// Any unpaid remainder of an existing stream is folded in.
    pub fn initiate_exit_stream(
        &mut self,
        account: &Address,
        now: u64,
    ) -> Result<ExitStream, LockError> {
        let plan = self.prepare_exit_stream(account, now)?;
        let stream = plan.stream;
        self.commit_exit_stream(plan);
        Ok(stream)
    }

    /// Compute the payout of the account's exit stream at `now`.
    ///
    /// An account without a stream gets a zero payout.
    pub fn preview_exit_withdrawal(
        &self,
        account: &Address,
        now: u64,
    ) -> Result<ExitWithdrawal, LockError> {
        let Some(stream) = self.exit_stream(account) else {
            return Ok(ExitWithdrawal { account: *account, payout: 0, next: None });
        };

        let window = self.clock.duration();
        let elapsed = now.saturating_sub(stream.start);
        if elapsed >= window {
            return Ok(ExitWithdrawal {
                account: *account,
                payout: stream.remaining(),
                next: None,
            });
        }

        let vested = linear_vested(stream.amount, elapsed, window)
            .ok_or(LockError::BalanceOverflow)?
            .max(stream.claimed);
        Ok(ExitWithdrawal {
            account: *account,
            payout: vested - stream.claimed,
            next: Some(ExitStream { claimed: vested, ..stream }),
        })
    }

    pub fn commit_exit_withdrawal(&mut self, withdrawal: ExitWithdrawal) {
        if let Some(entry) = self.accounts.get_mut(&withdrawal.account) {
            if entry.exit_stream.is_none() {
                return;
            }
            entry.exit_stream = withdrawal.next;
            debug!(
                account = %withdrawal.account,
                payout = withdrawal.payout,
                closed = withdrawal.closes_stream(),
                "exit: stream withdrawn"
            );
        }
    }

    /// Pay out whatever has vested since the last withdrawal.
    pub fn withdraw_exit_stream(
        &mut self,
        account: &Address,
        now: u64,
    ) -> Result<Amount, LockError> {
        let withdrawal = self.preview_exit_withdrawal(account, now)?;
        let payout = withdrawal.payout;
        self.commit_exit_withdrawal(withdrawal);
        Ok(payout)
    }

    // --- queries ---

    pub fn current_epoch(&self, now: u64) -> Epoch {
        self.clock.epoch_at(now)
    }

    /// Account weight in the epoch containing `now`.
    pub fn weight_of(&self, account: &Address, now: u64) -> Amount {
        self.account_weight_at(account, self.clock.epoch_at(now))
    }

    /// Total weight in the epoch containing `now`.
    pub fn total_weight(&self, now: u64) -> Amount {
        self.total_weight_at(self.clock.epoch_at(now))
    }

    pub fn account_weight_at(&self, account: &Address, epoch: Epoch) -> Amount {
        self.accounts
            .get(account)
            .map_or(0, |a| a.weight.get(epoch))
    }

    pub fn total_weight_at(&self, epoch: Epoch) -> Amount {
        self.total_weight.get(epoch)
    }

    /// Principal scheduled to mature exactly at `epoch`.
    pub fn unlock_at(&self, account: &Address, epoch: Epoch) -> Amount {
        self.unlock_value(account, epoch)
    }

    pub fn withdrawn_until(&self, account: &Address) -> Epoch {
        self.accounts.get(account).map_or(0, |a| a.withdrawn_until)
    }

    /// Principal not yet swept into an exit stream, matured or not.
    pub fn unwithdrawn_balance(&self, account: &Address) -> Amount {
        self.accounts.get(account).map_or(0, |a| {
            a.unlocks
                .sum_range(a.withdrawn_until + 1..)
                .unwrap_or(Amount::MAX)
        })
    }

    /// Principal still locked (maturing after the current epoch).
    pub fn locked_balance(&self, account: &Address, now: u64) -> Amount {
        let current = self.clock.epoch_at(now);
        self.accounts.get(account).map_or(0, |a| {
            let from = current.max(a.withdrawn_until) + 1;
            a.unlocks.sum_range(from..).unwrap_or(Amount::MAX)
        })
    }

    /// Principal matured but not yet swept into an exit stream.
    pub fn matured_balance(&self, account: &Address, now: u64) -> Amount {
        let current = self.clock.epoch_at(now);
        self.accounts.get(account).map_or(0, |a| {
            if current <= a.withdrawn_until {
                return 0;
            }
            a.unlocks
                .sum_range(a.withdrawn_until + 1..=current)
                .unwrap_or(Amount::MAX)
        })
    }

    /// Non-empty unlock buckets after the current epoch, nearest first.
    pub fn lock_buckets(&self, account: &Address, now: u64) -> Vec<UnlockBucket> {
        let current = self.clock.epoch_at(now);
        self.accounts.get(account).map_or_else(Vec::new, |a| {
            a.unlocks
                .iter_range(current + 1..)
                .map(|(epoch, amount)| UnlockBucket {
                    weeks_to_unlock: epoch - current,
                    amount,
                })
                .collect()
        })
    }

    pub fn exit_stream(&self, account: &Address) -> Option<ExitStream> {
        self.accounts.get(account).and_then(|a| a.exit_stream)
    }

    /// Amount [`withdraw_exit_stream`](Self::withdraw_exit_stream) would pay at `now`.
    pub fn exit_stream_withdrawable(&self, account: &Address, now: u64) -> Amount {
        self.preview_exit_withdrawal(account, now)
            .map_or(0, |w| w.payout)
    }

    /// Accounts that have ever locked.
    pub fn accounts(&self) -> impl Iterator<Item = &Address> + '_ {
        self.accounts.keys()
    }
}

impl WeightSource for LockLedger {
    fn epoch_clock(&self) -> &EpochClock {
        &self.clock
    }

    fn weights_at(&self, account: &Address, epoch: Epoch) -> (Amount, Amount) {
        (self.account_weight_at(account, epoch), self.total_weight_at(epoch))
    }
}
