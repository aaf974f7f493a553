//! Protocol constants. Token amounts use 18-decimal base units.

/// One whole token in base units.
pub const TOKEN_UNIT: u128 = 1_000_000_000_000_000_000;

/// Length of one epoch in seconds (one week).
pub const EPOCH_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest lock duration accepted, in epochs.
///
/// Bounds the cost of every lock and extension to `MAX_LOCK_WEEKS` series
/// writes.
pub const MAX_LOCK_WEEKS: u64 = 52;

/// Largest `max_lock_weeks` a configuration may set (ten years of weekly
/// epochs).
pub const MAX_LOCK_WEEKS_CEILING: u64 = 520;

/// Basis-point denominator used by transfer-fee tokens.
pub const BPS_PRECISION: u64 = 10_000;
