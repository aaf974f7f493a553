//! Integration test suite for Locktide.
//!
//! Drives the engine end to end through its public API, with an in-memory
//! token collaborator, and checks ledger invariants under randomized
//! operation sequences.

pub mod helpers;
