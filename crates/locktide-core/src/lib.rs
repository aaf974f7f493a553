//! # locktide-core
//! Foundation types, errors and collaborator traits for the Locktide ledgers.

pub mod clock;
pub mod constants;
pub mod error;
pub mod events;
pub mod math;
pub mod token;
pub mod traits;
pub mod types;
