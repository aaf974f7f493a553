//! Wide-intermediate integer helpers.
//!
//! Fee shares multiply a fee total by a weight, both up to 128 bits, so the
//! product is formed in 256 bits before the floor division.

use alloy_primitives::U256;

/// `floor(a * b / denominator)`.
///
/// Returns `None` if `denominator` is zero or the quotient does not fit in
/// 128 bits. The product itself cannot overflow 256 bits.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Option<u128> {
    if denominator == 0 {
        return None;
    }
    let product = U256::from(a).checked_mul(U256::from(b))?;
    let quotient = product / U256::from(denominator);
    u128::try_from(quotient).ok()
}

/// Portion of `amount` vested after `elapsed` of a `window`-long linear
/// release. Saturates at `amount` once `elapsed >= window`.
pub fn linear_vested(amount: u128, elapsed: u64, window: u64) -> Option<u128> {
    if window == 0 || elapsed >= window {
        return Some(amount);
    }
    mul_div(amount, elapsed as u128, window as u128)
}
