//! Epoch clock: maps wall-clock seconds to epoch indices.
//!
//! Genesis is floored to a multiple of the epoch duration, so every epoch
//! boundary is `genesis + e * duration` and epoch 0 starts at or before the
//! configured genesis time. Timestamps before genesis map to epoch 0.

use serde::{Deserialize, Serialize};

use crate::error::ClockError;
use crate::types::Epoch;

/// Fixed-duration epoch schedule anchored at an aligned genesis.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct EpochClock {
    genesis: u64,
    duration: u64,
}

impl EpochClock {
    /// Create a clock whose epoch 0 contains `genesis_time`.
    pub fn new(genesis_time: u64, duration: u64) -> Result<Self, ClockError> {
        if duration == 0 {
            return Err(ClockError::ZeroDuration);
        }
        Ok(Self {
            genesis: genesis_time - genesis_time % duration,
            duration,
        })
    }

    /// Aligned start of epoch 0.
    pub fn genesis(&self) -> u64 {
        self.genesis
    }

    /// Epoch length in seconds.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Epoch containing `now`.
    pub fn epoch_at(&self, now: u64) -> Epoch {
        now.saturating_sub(self.genesis) / self.duration
    }

    /// First second of `epoch`.
    pub fn epoch_start(&self, epoch: Epoch) -> u64 {
        self.genesis
            .saturating_add(epoch.saturating_mul(self.duration))
    }

    /// Seconds elapsed since the start of the epoch containing `now`.
    pub fn offset_in_epoch(&self, now: u64) -> u64 {
        now.saturating_sub(self.genesis) % self.duration
    }
}
