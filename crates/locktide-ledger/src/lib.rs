//! # locktide-ledger
//! Lock-weight accounting and fee streaming for Locktide.
//!
//! [`LockLedger`] tracks duration-weighted balances and exit streams.
//! [`FeeLedger`] splits deposited fees by those weights and streams each
//! epoch's share over the following epoch. [`Engine`] composes both with a
//! token collaborator behind a one-time bootstrap.

pub mod config;
pub mod engine;
pub mod fee_ledger;
pub mod lock_ledger;
pub mod series;
pub mod snapshot;

pub use config::EngineConfig;
pub use engine::Engine;
pub use fee_ledger::{FeeClaim, FeeLedger};
pub use lock_ledger::{ExitPlan, ExitWithdrawal, LockLedger, LockPlan};
