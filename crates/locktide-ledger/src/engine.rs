//! Engine composition: bootstrap lifecycle, token movement, events.
//!
//! The [`Engine`] wires a [`LockLedger`] and a [`FeeLedger`] to a
//! [`TokenLedger`] collaborator. It starts `Uninitialized`, with a single
//! deployer allowed to call [`configure`](Engine::configure) once. After
//! that the deployer is forgotten and every operation is permissionless.
//!
//! Each mutating call validates and computes its ledger changes first,
//! moves tokens second, and commits last, so a failure anywhere leaves the
//! ledgers untouched. Timestamps must never go backwards.

use tracing::info;

use locktide_core::error::{BootstrapError, LedgerError};
use locktide_core::events::Event;
use locktide_core::traits::TokenLedger;
use locktide_core::types::{Address, Amount, Epoch, ExitStream, FeeStream, TokenId, UnlockBucket};

use crate::config::EngineConfig;
use crate::fee_ledger::{paid_per_request, FeeLedger};
use crate::lock_ledger::LockLedger;
use crate::snapshot::LedgerSnapshot;

/// State owned once the engine is configured.
#[derive(Debug, Clone)]
struct Ledgers {
    config: EngineConfig,
    locks: LockLedger,
    fees: FeeLedger,
}

#[derive(Debug, Clone)]
enum Phase {
    Uninitialized { deployer: Address },
    Configured(Box<Ledgers>),
}

impl Phase {
    fn ledgers(&self) -> Result<&Ledgers, BootstrapError> {
        match self {
            Self::Configured(l) => Ok(l),
            Self::Uninitialized { .. } => Err(BootstrapError::NotConfigured),
        }
    }

    fn ledgers_mut(&mut self) -> Result<&mut Ledgers, BootstrapError> {
        match self {
            Self::Configured(l) => Ok(l),
            Self::Uninitialized { .. } => Err(BootstrapError::NotConfigured),
        }
    }
}

/// Lock-weight and fee-streaming engine holding tokens in `vault`.
#[derive(Debug, Clone)]
pub struct Engine<T: TokenLedger> {
    vault: Address,
    tokens: T,
    phase: Phase,
    events: Vec<Event>,
    last_timestamp: u64,
}

impl<T: TokenLedger> Engine<T> {
    /// Create an unconfigured engine. Only `deployer` may configure it.
    pub fn deploy(vault: Address, deployer: Address, tokens: T) -> Self {
        Self {
            vault,
            tokens,
            phase: Phase::Uninitialized { deployer },
            events: Vec::new(),
            last_timestamp: 0,
        }
    }

    /// One-time wiring of both ledgers from `config`.
    ///
    /// The fee ledger is built on the lock ledger's clock, so both agree on
    /// every epoch boundary. The deployer privilege is dropped on success.
    pub fn configure(
        &mut self,
        caller: &Address,
        config: EngineConfig,
        now: u64,
    ) -> Result<(), LedgerError> {
        let deployer = match &self.phase {
            Phase::Configured(_) => return Err(BootstrapError::AlreadyConfigured.into()),
            Phase::Uninitialized { deployer } => *deployer,
        };
        if *caller != deployer {
            return Err(BootstrapError::Unauthorized(caller.to_string()).into());
        }

        let clock = config.clock()?;
        let locks = LockLedger::new(clock, config.max_lock_weeks);
        let fees = FeeLedger::new(*locks.clock());

        info!(
            %deployer,
            genesis = clock.genesis(),
            epoch_duration = clock.duration(),
            max_lock_weeks = config.max_lock_weeks,
            lock_token = %config.lock_token,
            "engine: configured, deployer revoked"
        );
        self.events.push(Event::Configured {
            deployer,
            genesis: clock.genesis(),
            epoch_duration: clock.duration(),
        });
        self.phase = Phase::Configured(Box::new(Ledgers { config, locks, fees }));
        self.last_timestamp = self.last_timestamp.max(now);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.phase, Phase::Configured(_))
    }

    /// Address still allowed to configure; `None` once configured.
    pub fn deployer(&self) -> Option<&Address> {
        match &self.phase {
            Phase::Uninitialized { deployer } => Some(deployer),
            Phase::Configured(_) => None,
        }
    }

    fn check_time(&self, now: u64) -> Result<(), LedgerError> {
        if now < self.last_timestamp {
            return Err(LedgerError::TimeRegression { last: self.last_timestamp, now });
        }
        Ok(())
    }

    // --- locks ---

    /// Lock `amount` of the lock token from `account` for `weeks` epochs.
    /// Returns the unlock epoch.
    pub fn lock(
        &mut self,
        account: &Address,
        amount: Amount,
        weeks: u64,
        now: u64,
    ) -> Result<Epoch, LedgerError> {
        self.check_time(now)?;
        let ledgers = self.phase.ledgers_mut()?;
        let plan = ledgers.locks.prepare_lock(account, amount, weeks, now)?;

        let token = ledgers.config.lock_token;
        self.tokens
            .transfer_from(&token, &self.vault, account, &self.vault, amount)?;

        let event = Event::Locked {
            account: *plan.account(),
            amount: plan.amount(),
            weeks: plan.to_weeks(),
            unlock_epoch: plan.unlock_epoch(),
        };
        let unlock_epoch = plan.unlock_epoch();
        ledgers.locks.commit_lock(plan);
        self.events.push(event);
        self.last_timestamp = now;
        Ok(unlock_epoch)
    }

    /// Move `amount` of `account`'s principal maturing in `from_weeks` epochs
    /// to mature in `to_weeks` epochs instead.
    pub fn extend_lock(
        &mut self,
        account: &Address,
        amount: Amount,
        from_weeks: u64,
        to_weeks: u64,
        now: u64,
    ) -> Result<(), LedgerError> {
        self.check_time(now)?;
        let ledgers = self.phase.ledgers_mut()?;
        let plan = ledgers
            .locks
            .prepare_extend(account, amount, from_weeks, to_weeks, now)?;
        let event = Event::LockExtended {
            account: *plan.account(),
            amount: plan.amount(),
            from_weeks: plan.from_weeks(),
            to_weeks: plan.to_weeks(),
        };
        ledgers.locks.commit_lock(plan);
        self.events.push(event);
        self.last_timestamp = now;
        Ok(())
    }

    /// Sweep `account`'s matured principal into a fresh exit stream.
    pub fn initiate_exit_stream(
        &mut self,
        account: &Address,
        now: u64,
    ) -> Result<ExitStream, LedgerError> {
        self.check_time(now)?;
        let ledgers = self.phase.ledgers_mut()?;
        let plan = ledgers.locks.prepare_exit_stream(account, now)?;
        let matured = plan.matured();
        let stream = *plan.stream();
        ledgers.locks.commit_exit_stream(plan);
        self.events.push(Event::ExitStreamInitiated {
            account: *account,
            matured,
            stream_amount: stream.amount,
        });
        self.last_timestamp = now;
        Ok(stream)
    }

    /// Pay `account` the vested part of its exit stream. Zero if nothing is
    /// vested or no stream is open.
    pub fn withdraw_exit_stream(
        &mut self,
        account: &Address,
        now: u64,
    ) -> Result<Amount, LedgerError> {
        self.check_time(now)?;
        let ledgers = self.phase.ledgers_mut()?;
        let withdrawal = ledgers.locks.preview_exit_withdrawal(account, now)?;
        let payout = withdrawal.payout();

        if payout > 0 {
            let token = ledgers.config.lock_token;
            self.tokens.transfer(&token, &self.vault, account, payout)?;
            self.events.push(Event::ExitStreamWithdrawn { account: *account, amount: payout });
        }
        ledgers.locks.commit_exit_withdrawal(withdrawal);
        self.last_timestamp = now;
        Ok(payout)
    }

    // --- fees ---

    /// Pull `amount` of `token` from `depositor` and credit what actually
    /// arrived to the current epoch. Returns the amount credited.
    pub fn deposit_fee(
        &mut self,
        depositor: &Address,
        token: &TokenId,
        amount: Amount,
        now: u64,
    ) -> Result<Amount, LedgerError> {
        self.check_time(now)?;
        let ledgers = self.phase.ledgers_mut()?;
        ledgers.fees.check_deposit(token, amount, now)?;

        let before = self.tokens.balance_of(token, &self.vault);
        self.tokens
            .transfer_from(token, &self.vault, depositor, &self.vault, amount)?;
        let received = self.tokens.balance_of(token, &self.vault).saturating_sub(before);

        let epoch = ledgers.fees.record_deposit(token, received, now)?;
        info!(%depositor, %token, requested = amount, received, epoch, "fee: received");
        self.events.push(Event::FeeReceived {
            depositor: *depositor,
            token: *token,
            amount: received,
            epoch,
        });
        self.last_timestamp = now;
        Ok(received)
    }

    /// Claim `account`'s streamed fee share of each token. Returns the amount
    /// paid per requested token; repeated tokens pay zero.
    ///
    /// Transfers run against a copy of the token ledger that replaces the
    /// live one only once every payout has succeeded.
    pub fn claim(
        &mut self,
        account: &Address,
        tokens: &[TokenId],
        now: u64,
    ) -> Result<Vec<Amount>, LedgerError>
    where
        T: Clone,
    {
        self.check_time(now)?;
        let ledgers = self.phase.ledgers_mut()?;
        let plans = ledgers.fees.plan_claims(&ledgers.locks, account, tokens, now)?;

        for plan in &plans {
            let have = self.tokens.balance_of(plan.token(), &self.vault);
            if have < plan.payable() {
                return Err(LedgerError::VaultShortfall {
                    token: *plan.token(),
                    have,
                    need: plan.payable(),
                });
            }
        }

        let mut staged = self.tokens.clone();
        for plan in plans.iter().filter(|p| p.payable() > 0) {
            staged.transfer(plan.token(), &self.vault, account, plan.payable())?;
        }
        self.tokens = staged;

        let paid = paid_per_request(tokens, &plans);
        for plan in plans {
            let (token, amount) = (*plan.token(), plan.payable());
            if amount > 0 {
                info!(%account, %token, amount, "fee: claimed");
                self.events.push(Event::FeeClaimed { account: *account, token, amount });
            }
            ledgers.fees.commit_claim(account, plan);
        }
        self.last_timestamp = now;
        Ok(paid)
    }

    /// What [`claim`](Self::claim) would pay at `now`, without mutating.
    pub fn claimable(
        &self,
        account: &Address,
        tokens: &[TokenId],
        now: u64,
    ) -> Result<Vec<Amount>, LedgerError> {
        let ledgers = self.phase.ledgers()?;
        Ok(ledgers.fees.claimable(&ledgers.locks, account, tokens, now)?)
    }

    // --- queries ---

    pub fn config(&self) -> Result<&EngineConfig, LedgerError> {
        Ok(&self.phase.ledgers()?.config)
    }

    pub fn lock_ledger(&self) -> Result<&LockLedger, LedgerError> {
        Ok(&self.phase.ledgers()?.locks)
    }

    pub fn fee_ledger(&self) -> Result<&FeeLedger, LedgerError> {
        Ok(&self.phase.ledgers()?.fees)
    }

    pub fn current_epoch(&self, now: u64) -> Result<Epoch, LedgerError> {
        Ok(self.lock_ledger()?.current_epoch(now))
    }

    /// `(account weight, total weight)` at `epoch`.
    pub fn weights_at(
        &self,
        account: &Address,
        epoch: Epoch,
    ) -> Result<(Amount, Amount), LedgerError> {
        let locks = self.lock_ledger()?;
        Ok((locks.account_weight_at(account, epoch), locks.total_weight_at(epoch)))
    }

    pub fn weight_of(&self, account: &Address, now: u64) -> Result<Amount, LedgerError> {
        Ok(self.lock_ledger()?.weight_of(account, now))
    }

    pub fn total_weight(&self, now: u64) -> Result<Amount, LedgerError> {
        Ok(self.lock_ledger()?.total_weight(now))
    }

    pub fn unwithdrawn_balance(&self, account: &Address) -> Result<Amount, LedgerError> {
        Ok(self.lock_ledger()?.unwithdrawn_balance(account))
    }

    pub fn lock_buckets(
        &self,
        account: &Address,
        now: u64,
    ) -> Result<Vec<UnlockBucket>, LedgerError> {
        Ok(self.lock_ledger()?.lock_buckets(account, now))
    }

    pub fn locked_balance(&self, account: &Address, now: u64) -> Result<Amount, LedgerError> {
        Ok(self.lock_ledger()?.locked_balance(account, now))
    }

    pub fn matured_balance(&self, account: &Address, now: u64) -> Result<Amount, LedgerError> {
        Ok(self.lock_ledger()?.matured_balance(account, now))
    }

    pub fn exit_stream(&self, account: &Address) -> Result<Option<ExitStream>, LedgerError> {
        Ok(self.lock_ledger()?.exit_stream(account))
    }

    pub fn exit_stream_withdrawable(
        &self,
        account: &Address,
        now: u64,
    ) -> Result<Amount, LedgerError> {
        Ok(self.lock_ledger()?.exit_stream_withdrawable(account, now))
    }

    /// Fee tokens in registration order.
    pub fn fee_tokens(&self) -> Result<&[TokenId], LedgerError> {
        Ok(self.fee_ledger()?.tokens())
    }

    pub fn fee_deposited(&self, token: &TokenId, epoch: Epoch) -> Result<Amount, LedgerError> {
        Ok(self.fee_ledger()?.deposited(token, epoch))
    }

    pub fn fee_checkpoint(
        &self,
        account: &Address,
        token: &TokenId,
    ) -> Result<Option<FeeStream>, LedgerError> {
        Ok(self.fee_ledger()?.checkpoint(account, token).copied())
    }

    pub fn vault(&self) -> &Address {
        &self.vault
    }

    pub fn tokens(&self) -> &T {
        &self.tokens
    }

    /// Direct access to the token collaborator, for funding and approvals.
    pub fn tokens_mut(&mut self) -> &mut T {
        &mut self.tokens
    }

    /// Latest timestamp accepted by a mutating call.
    pub fn last_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    // --- events ---

    /// Events recorded since the last drain, oldest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // --- snapshots ---

    /// Encode the configured ledger state.
    pub fn snapshot(&self) -> Result<Vec<u8>, LedgerError> {
        let ledgers = self.phase.ledgers()?;
        LedgerSnapshot {
            config: ledgers.config.clone(),
            locks: ledgers.locks.clone(),
            fees: ledgers.fees.clone(),
            last_timestamp: self.last_timestamp,
        }
        .encode()
    }

    /// Rebuild a configured engine from [`snapshot`](Self::snapshot) bytes.
    pub fn restore(vault: Address, tokens: T, bytes: &[u8]) -> Result<Self, LedgerError> {
        let snap = LedgerSnapshot::decode(bytes)?;
        Ok(Self {
            vault,
            tokens,
            phase: Phase::Configured(Box::new(Ledgers {
                config: snap.config,
                locks: snap.locks,
                fees: snap.fees,
            })),
            events: Vec::new(),
            last_timestamp: snap.last_timestamp,
        })
    }
}
