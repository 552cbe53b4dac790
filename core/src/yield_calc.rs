//! Yield payable on withdrawal from a market-issued asset (spec §4.3).
//!
//! Ported bit-exact from `balance_record::calculate_yield` in the original
//! chain's balance engine: the 80/20 linear/quadratic split and the 10⁶
//! scaling constant are part of the consensus-critical parameter set
//! (spec §6) and must never drift between implementations.

use ledger_common::math::YIELD_SCALE;
use ledger_common::ChainParams;

/// Computes accrued yield on `amount` held since `deposit_date`, against a
/// market-issued asset's `yield_pool` (== `collected_fees`) and
/// `share_supply` (== `current_share_supply`). Zero whenever the balance is
/// too young, the asset has no yield pool, or there is no circulating
/// supply to apportion it against.
///
/// A pure function — never touches a [`ledger_common::ChainStateView`]. The
/// caller (the balance engine's `withdraw`) is responsible for moving the
/// returned amount from `collected_fees` into the balance.
pub fn calculate_yield(
    now: i64,
    amount: i64,
    yield_pool: i64,
    share_supply: i64,
    deposit_date: i64,
    params: &ChainParams,
) -> i64 {
    if amount <= 0 || yield_pool <= 0 || share_supply <= 0 || share_supply == yield_pool {
        return 0;
    }
    let age = now.saturating_sub(deposit_date);
    if age < params.min_yield_period {
        return 0;
    }

    let circulating = (share_supply - yield_pool) as u128;
    if circulating == 0 {
        return 0;
    }

    let amount_u = amount as u128;
    let pool_u = yield_pool as u128;

    // Y = amount * 10^6 * yield_pool / circulating, still carrying the
    // 10^6 scale factor (divided out only at the very end).
    let base_y = amount_u
        .saturating_mul(YIELD_SCALE)
        .saturating_mul(pool_u)
        / circulating;

    let scaled = if age >= params.max_yield_period {
        base_y
    } else {
        let dt = age as u128;
        let t = params.max_yield_period as u128;
        // 0.8 * Y * (dt/t)
        let linear = base_y.saturating_mul(8).saturating_mul(dt) / (10 * t);
        // 0.2 * Y * (dt/t)^2
        let quad = base_y.saturating_mul(2).saturating_mul(dt).saturating_mul(dt) / (10 * t * t);
        linear + quad
    };

    let y = scaled / YIELD_SCALE;
    if y > 0 && y < yield_pool as u128 {
        y as i64
    } else {
        0
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Spec §8 property 4 ("Yield zeros"): below `min_yield_period`
        /// the result is always zero, regardless of how the other inputs
        /// are chosen.
        #[test]
        fn zero_below_min_yield_period(
            amount in 1_i64..1_000_000_000_000,
            yield_pool in 1_i64..1_000_000_000_000,
            share_supply in 1_i64..1_000_000_000_000,
            deposit_date in 0_i64..1_000_000_000,
            age_deficit in 1_i64..86_400,
        ) {
            let p = ChainParams::default();
            prop_assume!(share_supply != yield_pool);
            let now = deposit_date + (p.min_yield_period - age_deficit).max(0);
            let y = calculate_yield(now, amount, yield_pool, share_supply, deposit_date, &p);
            prop_assert_eq!(y, 0);
        }

        /// Spec §8 property 4: a non-positive amount, pool, or supply
        /// always yields zero.
        #[test]
        fn zero_for_nonpositive_inputs(
            now in 0_i64..1_000_000_000,
            deposit_date in 0_i64..1_000_000_000,
            yield_pool in 0_i64..1_000_000_000_000,
            share_supply in 1_i64..1_000_000_000_000,
        ) {
            let p = ChainParams::default();
            let y = calculate_yield(now, 0, yield_pool, share_supply, deposit_date, &p);
            prop_assert_eq!(y, 0);
        }

        /// Yield never reaches or exceeds its own pool (spec §4.3: "if the
        /// result is in (0, yield_pool), return it; else return zero").
        #[test]
        fn never_reaches_or_exceeds_pool(
            amount in 1_i64..1_000_000_000_000,
            yield_pool in 1_i64..1_000_000_000_000,
            circulating in 1_i64..1_000_000_000_000,
            age in 0_i64..(86_400 * 365 * 2),
        ) {
            let p = ChainParams::default();
            let share_supply = yield_pool.saturating_add(circulating);
            let y = calculate_yield(age, amount, yield_pool, share_supply, 0, &p);
            prop_assert!(y < yield_pool);
            prop_assert!(y >= 0);
        }
    }
}
