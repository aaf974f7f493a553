//! Shared constructors for integration tests.

use locktide_core::constants::EPOCH_DURATION_SECS;
use locktide_core::token::MemoryTokenLedger;
use locktide_core::types::{Address, Amount, TokenId};
use locktide_ledger::{Engine, EngineConfig};

pub const VAULT: Address = Address([0x99; 20]);
pub const DEPLOYER: Address = Address([0xDE; 20]);
pub const LOCK_TOKEN: TokenId = Address([0x10; 20]);
pub const FEE_TOKEN: TokenId = Address([0xFE; 20]);
pub const OTHER_FEE_TOKEN: TokenId = Address([0xEF; 20]);

/// Balance every funded account starts with, per token.
pub const STARTING_BALANCE: Amount = 1_000_000_000;

/// Address from a seed byte.
pub fn addr(seed: u8) -> Address {
    Address([seed; 20])
}

/// Start of `epoch` under the default config.
pub fn at(epoch: u64) -> u64 {
    epoch * EPOCH_DURATION_SECS
}

pub fn test_config() -> EngineConfig {
    EngineConfig { lock_token: LOCK_TOKEN, ..EngineConfig::default() }
}

/// Token ledger where each account holds [`STARTING_BALANCE`] of every test
/// token and has approved the vault for all of it.
pub fn funded_tokens(accounts: &[Address]) -> MemoryTokenLedger {
    let mut tokens = MemoryTokenLedger::new();
    for account in accounts {
        for token in [LOCK_TOKEN, FEE_TOKEN, OTHER_FEE_TOKEN] {
            tokens
                .mint(&token, account, STARTING_BALANCE)
                .expect("mint within supply");
            tokens.approve(&token, account, &VAULT, Amount::MAX);
        }
    }
    tokens
}

/// Engine configured at time 0 with `accounts` funded. Bootstrap events are
/// drained.
pub fn configured_engine(accounts: &[Address]) -> Engine<MemoryTokenLedger> {
    let mut engine = Engine::deploy(VAULT, DEPLOYER, funded_tokens(accounts));
    engine
        .configure(&DEPLOYER, test_config(), 0)
        .expect("valid test config");
    engine.drain_events();
    engine
}
