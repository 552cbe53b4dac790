//! Fixed-point arithmetic helpers shared by the balance engine, the yield
//! calculator, and the matching engine.
//!
//! Every multiplication here widens *before* multiplying, never after —
//! the spec's own promotion rule (§3: promote to 128-bit for any
//! multiplication whose numerator can reach `max_shares · 10⁶ · max_shares`)
//! is load-bearing, not a suggestion.

/// Scaling constant used by the yield curve (spec §4.3) and nowhere else —
/// it is not a price/quantity decimals constant, just the fixed factor that
/// keeps the 80/20 split from truncating.
pub const YIELD_SCALE: u128 = 1_000_000;

/// Fixed-point scale for order-book prices (quote units per base unit).
pub const PRICE_SCALE: i64 = 1_000_000;

/// Multiply two `i64` values widening to `i128`, used anywhere a
/// quote-amount or fee product could reach past `i64` before it is scaled
/// back down (the matching engine's `scale_quote`, `apply_fee_bps`).
#[inline]
pub fn mul_i64(a: i64, b: i64) -> i128 {
    (a as i128) * (b as i128)
}

/// Divide `i128` by `i128`, rounding toward zero (checked — a zero divisor
/// here is always a caller bug, never an expected input).
#[inline]
pub fn checked_div(numerator: i128, denominator: i128) -> Option<i128> {
    if denominator == 0 {
        None
    } else {
        numerator.checked_div(denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_i64_widens_before_overflow() {
        let a = i64::MAX;
        let b = 2_i64;
        assert_eq!(mul_i64(a, b), (a as i128) * 2);
    }

    #[test]
    fn checked_div_rejects_zero_denominator() {
        assert_eq!(checked_div(100, 0), None);
        assert_eq!(checked_div(100, 4), Some(25));
    }
}
