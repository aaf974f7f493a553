//! Binary snapshots of configured ledger state.
//!
//! Layout: `SNAPSHOT_MAGIC` followed by the bincode payload of a
//! [`LedgerSnapshot`]. Token balances belong to the token collaborator and
//! are not included.

use locktide_core::error::LedgerError;

use crate::config::EngineConfig;
use crate::fee_ledger::FeeLedger;
use crate::lock_ledger::LockLedger;

/// Magic prefix, the last byte is the format version.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"LKT\x01";

#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct LedgerSnapshot {
    pub config: EngineConfig,
    pub locks: LockLedger,
    pub fees: FeeLedger,
    pub last_timestamp: u64,
}

impl LedgerSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        let payload = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| LedgerError::Snapshot(format!("encode error: {e}")))?;
        let mut buf = Vec::with_capacity(SNAPSHOT_MAGIC.len() + payload.len());
        buf.extend_from_slice(&SNAPSHOT_MAGIC);
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode and check that the restored ledgers share one clock.
    pub fn decode(data: &[u8]) -> Result<Self, LedgerError> {
        let payload = data
            .strip_prefix(&SNAPSHOT_MAGIC[..])
            .ok_or_else(|| LedgerError::Snapshot("bad magic or version".into()))?;
        let (snap, read): (Self, usize) =
            bincode::decode_from_slice(payload, bincode::config::standard())
                .map_err(|e| LedgerError::Snapshot(format!("decode error: {e}")))?;
        if read != payload.len() {
            return Err(LedgerError::Snapshot(format!(
                "{} trailing bytes",
                payload.len() - read
            )));
        }
        snap.validate()?;
        Ok(snap)
    }

    fn validate(&self) -> Result<(), LedgerError> {
        let clock = self.config.clock()?;
        if self.locks.clock() != &clock || self.fees.clock() != &clock {
            return Err(LedgerError::Snapshot("ledger clocks disagree with config".into()));
        }
        if self.locks.max_lock_weeks() != self.config.max_lock_weeks {
            return Err(LedgerError::Snapshot("max_lock_weeks disagrees with config".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locktide_core::types::{Address, TokenId};

    const WEEK: u64 = 604_800;
    const ALICE: Address = Address([0xA1; 20]);
    const FEE: TokenId = Address([0xFE; 20]);

    fn sample() -> LedgerSnapshot {
        let config = EngineConfig::default();
        let clock = config.clock().unwrap();
        let mut locks = LockLedger::new(clock, config.max_lock_weeks);
        locks.lock(&ALICE, 500, 8, 0).unwrap();
        let mut fees = FeeLedger::new(clock);
        fees.record_deposit(&FEE, 900, WEEK).unwrap();
        fees.claim(&locks, &ALICE, &[FEE], 2 * WEEK + 10).unwrap();
        LedgerSnapshot { config, locks, fees, last_timestamp: 2 * WEEK + 10 }
    }

    #[test]
    fn encode_decode_preserves_ledgers() {
        let snap = sample();
        let bytes = snap.encode().unwrap();
        assert!(bytes.starts_with(&SNAPSHOT_MAGIC));
        let back = LedgerSnapshot::decode(&bytes).unwrap();
        assert_eq!(back, snap);
        assert_eq!(back.fees.checkpoint(&ALICE, &FEE), snap.fees.checkpoint(&ALICE, &FEE));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = sample().encode().unwrap();
        bytes[3] = 0x02;
        assert!(matches!(LedgerSnapshot::decode(&bytes), Err(LedgerError::Snapshot(_))));
        assert!(LedgerSnapshot::decode(b"LK").is_err());
    }

    #[test]
    fn truncated_and_trailing_rejected() {
        let bytes = sample().encode().unwrap();
        assert!(LedgerSnapshot::decode(&bytes[..bytes.len() - 1]).is_err());
        let mut padded = bytes.clone();
        padded.push(0);
        assert!(LedgerSnapshot::decode(&padded).is_err());
    }

    #[test]
    fn clock_disagreement_rejected() {
        let mut snap = sample();
        snap.config.genesis_time = 10 * WEEK;
        let bytes = snap.encode().unwrap();
        assert!(matches!(LedgerSnapshot::decode(&bytes), Err(LedgerError::Snapshot(_))));
    }
}
