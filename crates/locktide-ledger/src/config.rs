//! Engine configuration.
//!
//! Provides [`EngineConfig`] with defaults for the epoch schedule and lock
//! limits. Supplied once, to the bootstrap call.

use serde::{Deserialize, Serialize};

use locktide_core::clock::EpochClock;
use locktide_core::constants::{EPOCH_DURATION_SECS, MAX_LOCK_WEEKS, MAX_LOCK_WEEKS_CEILING};
use locktide_core::error::BootstrapError;
use locktide_core::types::TokenId;

/// Parameters fixed at bootstrap.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
#[serde(default)]
pub struct EngineConfig {
    /// Any timestamp inside epoch 0; floored to an epoch boundary.
    pub genesis_time: u64,
    /// Epoch length in seconds.
    pub epoch_duration_secs: u64,
    /// Longest lock accepted, in epochs.
    pub max_lock_weeks: u64,
    /// Token accepted for locking.
    pub lock_token: TokenId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            genesis_time: 0,
            epoch_duration_secs: EPOCH_DURATION_SECS,
            max_lock_weeks: MAX_LOCK_WEEKS,
            lock_token: TokenId::ZERO,
        }
    }
}

impl EngineConfig {
    /// Reject parameters the ledgers cannot run with.
    pub fn validate(&self) -> Result<(), BootstrapError> {
        if self.epoch_duration_secs == 0 {
            return Err(BootstrapError::InvalidConfig(
                "epoch_duration_secs must be non-zero".into(),
            ));
        }
        if self.max_lock_weeks == 0 {
            return Err(BootstrapError::InvalidConfig("max_lock_weeks must be non-zero".into()));
        }
        if self.max_lock_weeks > MAX_LOCK_WEEKS_CEILING {
            return Err(BootstrapError::InvalidConfig(format!(
                "max_lock_weeks {} exceeds {MAX_LOCK_WEEKS_CEILING}",
                self.max_lock_weeks
            )));
        }
        Ok(())
    }

    /// Epoch clock described by this config.
    pub fn clock(&self) -> Result<EpochClock, BootstrapError> {
        self.validate()?;
        EpochClock::new(self.genesis_time, self.epoch_duration_secs)
            .map_err(|e| BootstrapError::InvalidConfig(e.to_string()))
    }
}
