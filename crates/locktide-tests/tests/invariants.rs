//! Property-based invariant suite.
//!
//! Random operation sequences are replayed against a configured engine with
//! non-decreasing timestamps. Failing operations are allowed; the checks are
//! on what the ledgers and the vault look like afterwards.
//!
//! Invariants checked:
//! - Total weight equals the sum of account weights in every epoch
//! - Vault lock-token balance equals all principal not yet paid out
//! - Fees paid never exceed fees received, and the vault covers the rest
//! - Weight is zero once every lock has expired

use proptest::prelude::*;

use locktide_core::constants::EPOCH_DURATION_SECS;
use locktide_core::token::MemoryTokenLedger;
use locktide_core::traits::TokenLedger;
use locktide_core::types::{Address, Amount};
use locktide_ledger::Engine;
use locktide_tests::helpers::*;

const USERS: u8 = 3;
const HORIZON_EPOCHS: u64 = 16;

#[derive(Debug, Clone)]
enum Op {
    Lock { user: u8, amount: Amount, weeks: u64 },
    Extend { user: u8, amount: Amount, from: u64, to: u64 },
    Exit { user: u8 },
    Withdraw { user: u8 },
    Deposit { amount: Amount },
    Claim { user: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..USERS, 1u128..10_000, 1u64..=12)
            .prop_map(|(user, amount, weeks)| Op::Lock { user, amount, weeks }),
        (0..USERS, 1u128..5_000, 1u64..=6, 7u64..=12)
            .prop_map(|(user, amount, from, to)| Op::Extend { user, amount, from, to }),
        (0..USERS).prop_map(|user| Op::Exit { user }),
        (0..USERS).prop_map(|user| Op::Withdraw { user }),
        (1u128..100_000).prop_map(|amount| Op::Deposit { amount }),
        (0..USERS).prop_map(|user| Op::Claim { user }),
    ]
}

/// Ops paired with the seconds to advance before each.
fn schedule() -> impl Strategy<Value = Vec<(u64, Op)>> {
    prop::collection::vec((0..EPOCH_DURATION_SECS, op_strategy()), 1..60)
}

fn user(i: u8) -> Address {
    addr(i + 1)
}

const PAYER: Address = Address([0x77; 20]);

fn engine() -> Engine<MemoryTokenLedger> {
    let mut accounts: Vec<Address> = (0..USERS).map(user).collect();
    accounts.push(PAYER);
    configured_engine(&accounts)
}

/// Replays `ops`, returning the final timestamp and total fees claimed.
fn replay(engine: &mut Engine<MemoryTokenLedger>, ops: &[(u64, Op)]) -> (u64, Amount) {
    let mut now = 0u64;
    let mut claimed: Amount = 0;
    for (advance, op) in ops {
        now += advance;
        match op {
            Op::Lock { user: u, amount, weeks } => {
                let _ = engine.lock(&user(*u), *amount, *weeks, now);
            }
            Op::Extend { user: u, amount, from, to } => {
                let _ = engine.extend_lock(&user(*u), *amount, *from, *to, now);
            }
            Op::Exit { user: u } => {
                let _ = engine.initiate_exit_stream(&user(*u), now);
            }
            Op::Withdraw { user: u } => {
                let _ = engine.withdraw_exit_stream(&user(*u), now);
            }
            Op::Deposit { amount } => {
                let _ = engine.deposit_fee(&PAYER, &FEE_TOKEN, *amount, now);
            }
            Op::Claim { user: u } => {
                if let Ok(paid) = engine.claim(&user(*u), &[FEE_TOKEN], now) {
                    claimed += paid[0];
                }
            }
        }
    }
    (now, claimed)
}

fn total_deposited(engine: &Engine<MemoryTokenLedger>, last_epoch: u64) -> Amount {
    let fees = engine.fee_ledger().unwrap();
    (0..=last_epoch).map(|e| fees.deposited(&FEE_TOKEN, e)).sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn total_weight_is_sum_of_accounts(ops in schedule()) {
        let mut engine = engine();
        let (now, _) = replay(&mut engine, &ops);
        let locks = engine.lock_ledger().unwrap();
        let last = locks.current_epoch(now) + HORIZON_EPOCHS;
        for epoch in 0..=last {
            let sum: Amount = (0..USERS).map(|u| locks.account_weight_at(&user(u), epoch)).sum();
            prop_assert_eq!(locks.total_weight_at(epoch), sum);
        }
    }

    #[test]
    fn vault_holds_unpaid_principal(ops in schedule()) {
        let mut engine = engine();
        replay(&mut engine, &ops);
        let locks = engine.lock_ledger().unwrap();
        let owed: Amount = (0..USERS)
            .map(|u| {
                let a = user(u);
                locks.unwithdrawn_balance(&a) + locks.exit_stream(&a).map_or(0, |s| s.remaining())
            })
            .sum();
        prop_assert_eq!(engine.tokens().balance_of(&LOCK_TOKEN, &VAULT), owed);

        let returned: Amount = (0..USERS)
            .map(|u| engine.tokens().balance_of(&LOCK_TOKEN, &user(u)))
            .sum();
        prop_assert_eq!(returned + owed, STARTING_BALANCE * USERS as Amount);
    }

    #[test]
    fn fees_paid_never_exceed_received(ops in schedule()) {
        let mut engine = engine();
        let (now, claimed) = replay(&mut engine, &ops);
        let last_epoch = engine.current_epoch(now).unwrap();
        let deposited = total_deposited(&engine, last_epoch);
        prop_assert!(claimed <= deposited);
        prop_assert_eq!(
            engine.tokens().balance_of(&FEE_TOKEN, &VAULT),
            deposited - claimed
        );
    }

    #[test]
    fn everything_claimable_after_expiry(ops in schedule()) {
        let mut engine = engine();
        let (now, claimed_before) = replay(&mut engine, &ops);
        let last_epoch = engine.current_epoch(now).unwrap();
        let after = now + (HORIZON_EPOCHS + 2) * EPOCH_DURATION_SECS;

        let mut claimed = claimed_before;
        for u in 0..USERS {
            let a = user(u);
            prop_assert_eq!(engine.weight_of(&a, after).unwrap(), 0);
            claimed += engine.claim(&a, &[FEE_TOKEN], after).unwrap()[0];
        }
        // Rounding dust and epochs without weight stay in the vault.
        let deposited = total_deposited(&engine, last_epoch);
        prop_assert!(claimed <= deposited);
        prop_assert_eq!(engine.total_weight(after).unwrap(), 0);
    }
}
