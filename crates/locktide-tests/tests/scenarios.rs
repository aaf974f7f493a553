//! End-to-end engine scenarios.
//!
//! Each test configures an engine over an in-memory token ledger, drives it
//! through the public API with explicit timestamps, and checks ledger
//! queries, token balances and emitted events.

use locktide_core::constants::EPOCH_DURATION_SECS;
use locktide_core::error::{BootstrapError, FeeError, LedgerError, LockError};
use locktide_core::events::Event;
use locktide_core::token::MemoryTokenLedger;
use locktide_core::traits::TokenLedger;
use locktide_core::types::{Amount, UnlockBucket};
use locktide_ledger::Engine;
use locktide_tests::helpers::*;

const HALF: u64 = EPOCH_DURATION_SECS / 2;

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[test]
fn bootstrap_lifecycle() {
    let alice = addr(1);
    let mut engine = Engine::deploy(VAULT, DEPLOYER, funded_tokens(&[alice]));

    assert_eq!(
        engine.deposit_fee(&alice, &FEE_TOKEN, 10, 0),
        Err(LedgerError::Bootstrap(BootstrapError::NotConfigured))
    );
    assert!(matches!(
        engine.configure(&alice, test_config(), 0),
        Err(LedgerError::Bootstrap(BootstrapError::Unauthorized(_)))
    ));

    engine.configure(&DEPLOYER, test_config(), 0).unwrap();
    assert_eq!(engine.deployer(), None);
    assert_eq!(
        engine.configure(&DEPLOYER, test_config(), 0),
        Err(LedgerError::Bootstrap(BootstrapError::AlreadyConfigured))
    );

    // Every operation is permissionless after bootstrap.
    engine.lock(&alice, 10, 1, 0).unwrap();
    engine.deposit_fee(&alice, &FEE_TOKEN, 10, 0).unwrap();
}

#[test]
fn epoch_boundaries_shared_with_offset_genesis() {
    let alice = addr(1);
    let mut engine = Engine::deploy(VAULT, DEPLOYER, funded_tokens(&[alice]));
    let genesis = at(3) + 77;
    let config = locktide_ledger::EngineConfig { genesis_time: genesis, ..test_config() };
    engine.configure(&DEPLOYER, config, 0).unwrap();

    let start = at(3);
    for now in [start, start + 1, at(4) - 1, at(4), at(9) + HALF] {
        let lock_epoch = engine.lock_ledger().unwrap().current_epoch(now);
        let fee_epoch = engine.fee_ledger().unwrap().clock().epoch_at(now);
        assert_eq!(lock_epoch, fee_epoch);
    }
    assert_eq!(engine.current_epoch(at(4)).unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Lock weights
// ---------------------------------------------------------------------------

#[test]
fn lock_weight_ramp() {
    let alice = addr(1);
    let mut engine = configured_engine(&[alice]);
    assert_eq!(engine.lock(&alice, 1000, 4, at(0)).unwrap(), 4);

    let locks = engine.lock_ledger().unwrap();
    let expected = [4000, 3000, 2000, 1000, 0, 0];
    for (epoch, w) in expected.iter().enumerate() {
        assert_eq!(engine.weights_at(&alice, epoch as u64).unwrap(), (*w, *w));
    }
    assert_eq!(locks.unlock_at(&alice, 4), 1000);
    assert_eq!(locks.locked_balance(&alice, at(3)), 1000);
    assert_eq!(locks.matured_balance(&alice, at(4)), 1000);
}

#[test]
fn extension_moves_bucket() {
    let alice = addr(1);
    let mut engine = configured_engine(&[alice]);
    engine.lock(&alice, 1000, 2, at(0)).unwrap();
    engine.lock(&alice, 500, 5, at(0)).unwrap();
    engine.extend_lock(&alice, 600, 2, 5, at(0)).unwrap();

    assert_eq!(
        engine.lock_buckets(&alice, at(0)).unwrap(),
        vec![
            UnlockBucket { weeks_to_unlock: 2, amount: 400 },
            UnlockBucket { weeks_to_unlock: 5, amount: 1100 },
        ]
    );
    // 400*2 + 1100*5
    assert_eq!(engine.weight_of(&alice, at(0)).unwrap(), 6300);

    assert_eq!(
        engine.extend_lock(&alice, 500, 2, 5, at(0)),
        Err(LedgerError::Lock(LockError::UnlockUnderflow {
            epoch: 2,
            available: 400,
            requested: 500,
        }))
    );
    assert!(matches!(
        engine.extend_lock(&alice, 100, 5, 5, at(0)),
        Err(LedgerError::Lock(LockError::NonIncreasingExtension { .. }))
    ));
}

#[test]
fn lock_duration_bounds() {
    let alice = addr(1);
    let mut engine = configured_engine(&[alice]);
    let max = engine.config().unwrap().max_lock_weeks;
    assert!(matches!(
        engine.lock(&alice, 1, 0, 0),
        Err(LedgerError::Lock(LockError::InvalidDuration { .. }))
    ));
    assert!(matches!(
        engine.lock(&alice, 1, max + 1, 0),
        Err(LedgerError::Lock(LockError::InvalidDuration { .. }))
    ));
    assert_eq!(engine.lock(&alice, 1, max, 0).unwrap(), max);
}

// ---------------------------------------------------------------------------
// Exit streams
// ---------------------------------------------------------------------------

#[test]
fn exit_stream_half_way() {
    let alice = addr(1);
    let mut engine = configured_engine(&[alice]);
    engine.lock(&alice, 1000, 1, at(0)).unwrap();

    assert_eq!(
        engine.initiate_exit_stream(&alice, at(0) + HALF),
        Err(LedgerError::Lock(LockError::NothingMatured))
    );
    let stream = engine.initiate_exit_stream(&alice, at(1)).unwrap();
    assert_eq!(stream.amount, 1000);
    assert_eq!(engine.withdraw_exit_stream(&alice, at(1) + HALF).unwrap(), 500);
    assert_eq!(engine.withdraw_exit_stream(&alice, at(2) + HALF).unwrap(), 500);
    assert_eq!(engine.withdraw_exit_stream(&alice, at(3)).unwrap(), 0);
    assert_eq!(engine.tokens().balance_of(&LOCK_TOKEN, &alice), STARTING_BALANCE);
}

#[test]
fn exit_stream_restart_carries_remainder() {
    let alice = addr(1);
    let mut engine = configured_engine(&[alice]);
    engine.lock(&alice, 1000, 1, at(0)).unwrap();
    engine.lock(&alice, 200, 2, at(0)).unwrap();

    engine.initiate_exit_stream(&alice, at(1)).unwrap();
    assert_eq!(engine.withdraw_exit_stream(&alice, at(1) + HALF).unwrap(), 500);

    // 500 unpaid + 200 newly matured, restarted over a fresh epoch.
    let stream = engine.initiate_exit_stream(&alice, at(2)).unwrap();
    assert_eq!(stream.amount, 700);
    assert_eq!(stream.claimed, 0);
    assert_eq!(engine.withdraw_exit_stream(&alice, at(3)).unwrap(), 700);
    assert_eq!(engine.tokens().balance_of(&LOCK_TOKEN, &VAULT), 0);
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

#[test]
fn fee_share_streams_over_next_epoch() {
    let (alice, bob, payer) = (addr(1), addr(2), addr(3));
    let mut engine = configured_engine(&[alice, bob, payer]);
    engine.lock(&alice, 100, 1, at(5)).unwrap();
    engine.lock(&bob, 900, 1, at(5)).unwrap();
    assert_eq!(engine.weights_at(&alice, 5).unwrap(), (100, 1000));
    engine.deposit_fee(&payer, &FEE_TOKEN, 700, at(5)).unwrap();

    assert_eq!(engine.claimable(&alice, &[FEE_TOKEN], at(5) + HALF).unwrap(), vec![0]);
    assert_eq!(engine.claimable(&alice, &[FEE_TOKEN], at(6)).unwrap(), vec![0]);
    assert_eq!(engine.claimable(&alice, &[FEE_TOKEN], at(6) + HALF).unwrap(), vec![35]);
    assert_eq!(engine.claimable(&alice, &[FEE_TOKEN], at(7)).unwrap(), vec![70]);
    assert_eq!(engine.claimable(&alice, &[FEE_TOKEN], at(9)).unwrap(), vec![70]);

    assert_eq!(engine.claim(&alice, &[FEE_TOKEN], at(6) + HALF).unwrap(), vec![35]);
    assert_eq!(engine.claim(&alice, &[FEE_TOKEN], at(6) + HALF).unwrap(), vec![0]);
    assert_eq!(engine.claim(&alice, &[FEE_TOKEN], at(8)).unwrap(), vec![35]);
    assert_eq!(engine.claim(&bob, &[FEE_TOKEN], at(8)).unwrap(), vec![630]);
    assert_eq!(engine.tokens().balance_of(&FEE_TOKEN, &VAULT), 0);
}

#[test]
fn infrequent_claimer_gets_same_total() {
    let (alice, bob, payer) = (addr(1), addr(2), addr(3));
    let mut engine = configured_engine(&[alice, bob, payer]);
    engine.lock(&alice, 300, 20, at(0)).unwrap();
    engine.lock(&bob, 300, 20, at(0)).unwrap();

    for epoch in 0..10 {
        engine
            .deposit_fee(&payer, &FEE_TOKEN, 1000 + 2 * epoch as Amount, at(epoch))
            .unwrap();
        // Alice claims every epoch, Bob only at the end.
        engine.claim(&alice, &[FEE_TOKEN], at(epoch) + 1).unwrap();
    }
    engine.claim(&alice, &[FEE_TOKEN], at(12)).unwrap();
    engine.claim(&bob, &[FEE_TOKEN], at(12)).unwrap();

    let gained = |a| engine.tokens().balance_of(&FEE_TOKEN, a) - STARTING_BALANCE;
    assert_eq!(gained(&alice), gained(&bob));
    let deposited: Amount = (0..10).map(|e| 1000 + 2 * e as Amount).sum();
    assert_eq!(gained(&alice) + gained(&bob), deposited);
}

#[test]
fn transfer_fee_token_records_received_amount() {
    let (alice, payer) = (addr(1), addr(3));
    let mut engine = configured_engine(&[alice, payer]);
    engine.tokens_mut().set_transfer_fee_bps(&FEE_TOKEN, 100);
    engine.lock(&alice, 10, 4, at(0)).unwrap();

    assert_eq!(engine.deposit_fee(&payer, &FEE_TOKEN, 10_000, at(0)).unwrap(), 9_900);
    assert_eq!(engine.fee_ledger().unwrap().deposited(&FEE_TOKEN, 0), 9_900);
    assert_eq!(engine.tokens().balance_of(&FEE_TOKEN, &VAULT), 9_900);

    // Claim pays the recorded share, the outgoing transfer fee is the
    // recipient's loss.
    assert_eq!(engine.claim(&alice, &[FEE_TOKEN], at(2)).unwrap(), vec![9_900]);
    assert_eq!(engine.tokens().balance_of(&FEE_TOKEN, &VAULT), 0);
}

#[test]
fn multi_token_claim_dedupes() {
    let (alice, payer) = (addr(1), addr(3));
    let mut engine = configured_engine(&[alice, payer]);
    engine.lock(&alice, 10, 4, at(0)).unwrap();
    engine.deposit_fee(&payer, &FEE_TOKEN, 500, at(0)).unwrap();
    engine.deposit_fee(&payer, &OTHER_FEE_TOKEN, 80, at(0)).unwrap();
    assert_eq!(engine.fee_tokens().unwrap(), &[FEE_TOKEN, OTHER_FEE_TOKEN]);

    engine.drain_events();
    let paid = engine
        .claim(&alice, &[OTHER_FEE_TOKEN, FEE_TOKEN, OTHER_FEE_TOKEN], at(2))
        .unwrap();
    assert_eq!(paid, vec![80, 500, 0]);
    let claimed: Vec<_> = engine
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, Event::FeeClaimed { .. }))
        .collect();
    assert_eq!(claimed.len(), 2);
}

#[test]
fn fees_without_weight_are_stranded() {
    let (alice, payer) = (addr(1), addr(3));
    let mut engine = configured_engine(&[alice, payer]);
    engine.deposit_fee(&payer, &FEE_TOKEN, 400, at(0)).unwrap();
    engine.lock(&alice, 10, 4, at(1)).unwrap();
    engine.deposit_fee(&payer, &FEE_TOKEN, 100, at(1)).unwrap();

    assert_eq!(engine.claim(&alice, &[FEE_TOKEN], at(5)).unwrap(), vec![100]);
    assert_eq!(engine.tokens().balance_of(&FEE_TOKEN, &VAULT), 400);
}

#[test]
fn lock_token_as_fee_token_keeps_principal() {
    let (alice, payer) = (addr(1), addr(3));
    let mut engine = configured_engine(&[alice, payer]);
    engine.lock(&alice, 1000, 1, at(0)).unwrap();
    engine.deposit_fee(&payer, &LOCK_TOKEN, 50, at(0)).unwrap();

    assert_eq!(engine.claim(&alice, &[LOCK_TOKEN], at(1) + HALF).unwrap(), vec![25]);
    engine.initiate_exit_stream(&alice, at(1) + HALF).unwrap();
    assert_eq!(engine.withdraw_exit_stream(&alice, at(3)).unwrap(), 1000);
    assert_eq!(engine.claim(&alice, &[LOCK_TOKEN], at(3)).unwrap(), vec![25]);
    assert_eq!(engine.tokens().balance_of(&LOCK_TOKEN, &VAULT), 0);
}

#[test]
fn zero_deposit_rejected() {
    let payer = addr(3);
    let mut engine = configured_engine(&[payer]);
    assert_eq!(
        engine.deposit_fee(&payer, &FEE_TOKEN, 0, at(0)),
        Err(LedgerError::Fee(FeeError::ZeroAmount))
    );
}

// ---------------------------------------------------------------------------
// Time and persistence
// ---------------------------------------------------------------------------

#[test]
fn regressing_timestamp_rejected_without_mutation() {
    let alice = addr(1);
    let mut engine = configured_engine(&[alice]);
    engine.lock(&alice, 10, 4, at(3)).unwrap();
    assert!(matches!(
        engine.lock(&alice, 10, 4, at(2)),
        Err(LedgerError::TimeRegression { .. })
    ));
    assert_eq!(engine.unwithdrawn_balance(&alice).unwrap(), 10);
    // Same timestamp is fine.
    engine.lock(&alice, 10, 4, at(3)).unwrap();
}

#[test]
fn restored_engine_continues_identically() {
    let (alice, bob, payer) = (addr(1), addr(2), addr(3));
    let mut original = configured_engine(&[alice, bob, payer]);
    original.lock(&alice, 400, 6, at(0)).unwrap();
    original.lock(&bob, 100, 3, at(1)).unwrap();
    original.deposit_fee(&payer, &FEE_TOKEN, 999, at(1)).unwrap();
    original.claim(&bob, &[FEE_TOKEN], at(2) + HALF).unwrap();

    let bytes = original.snapshot().unwrap();
    let mut restored: Engine<MemoryTokenLedger> =
        Engine::restore(VAULT, original.tokens().clone(), &bytes).unwrap();

    for engine in [&mut original, &mut restored] {
        engine.deposit_fee(&payer, &FEE_TOKEN, 123, at(3)).unwrap();
        engine.initiate_exit_stream(&bob, at(4)).unwrap();
    }
    for account in [alice, bob] {
        assert_eq!(
            original.claimable(&account, &[FEE_TOKEN], at(6)).unwrap(),
            restored.claimable(&account, &[FEE_TOKEN], at(6)).unwrap()
        );
        assert_eq!(
            original.lock_buckets(&account, at(4)).unwrap(),
            restored.lock_buckets(&account, at(4)).unwrap()
        );
    }
    assert_eq!(original.lock_ledger().unwrap(), restored.lock_ledger().unwrap());
}
