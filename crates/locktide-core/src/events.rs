//! Events emitted by state-changing engine calls, for external indexing.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, Epoch, TokenId};

/// One state change, tagged by kind when serialized.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// The one-time bootstrap completed and the deployer was revoked.
    Configured {
        deployer: Address,
        genesis: u64,
        epoch_duration: u64,
    },
    /// New principal locked.
    Locked {
        account: Address,
        amount: Amount,
        weeks: u64,
        unlock_epoch: Epoch,
    },
    /// Principal moved to a later unlock epoch.
    LockExtended {
        account: Address,
        amount: Amount,
        from_weeks: u64,
        to_weeks: u64,
    },
    /// Matured principal swept into a fresh exit stream.
    ExitStreamInitiated {
        account: Address,
        matured: Amount,
        stream_amount: Amount,
    },
    /// Vested exit-stream principal paid out.
    ExitStreamWithdrawn {
        account: Address,
        amount: Amount,
    },
    /// Fee income recorded for an epoch.
    FeeReceived {
        depositor: Address,
        token: TokenId,
        amount: Amount,
        epoch: Epoch,
    },
    /// Fee share paid out.
    FeeClaimed {
        account: Address,
        token: TokenId,
        amount: Amount,
    },
}

impl Event {
    /// Address that triggered the event.
    pub fn actor(&self) -> &Address {
        match self {
            Self::Configured { deployer, .. } => deployer,
            Self::FeeReceived { depositor, .. } => depositor,
            Self::Locked { account, .. }
            | Self::LockExtended { account, .. }
            | Self::ExitStreamInitiated { account, .. }
            | Self::ExitStreamWithdrawn { account, .. }
            | Self::FeeClaimed { account, .. } => account,
        }
    }
}
