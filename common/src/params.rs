//! Chain parameters that must match bit-exact across implementations
//! (spec §6). A divergence in any of these produces a chain fork, so they
//! are plain data — never tunable at the call site of an operation, only
//! at the construction site of a [`ChainParams`].

use ledger_ids::ShareType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainParams {
    /// Balances younger than this (in seconds) never accrue yield.
    pub min_yield_period: i64,
    /// Age at which the yield curve reaches its uncapped value.
    pub max_yield_period: i64,
    /// Largest delegate slate the engine will store.
    pub max_slate_size: usize,
    /// Minimum age of a restricted-owner-signed vote update.
    pub vote_update_period: i64,
    /// Collateral age at which an open short/cover expires.
    pub max_short_period: i64,
    /// Base units per coin unit (10^8 in the reference chain).
    pub precision: i64,
    /// Floor on a base-coin burn.
    pub min_burn_fee: i64,
    /// Upper bound any asset's `current_share_supply` may ever reach.
    pub max_shares: ShareType,
    /// Exchange fee routed to the quote asset's `collected_fees`, in bps.
    pub exchange_fee_bps: i64,
    /// Collateral-to-debt ratio (in bps, e.g. 11000 = 110%) below which a
    /// short's call price crosses the feed and it becomes margin-called
    /// (spec §4.6 ask selection).
    pub margin_call_ratio_bps: i64,
    /// Defensive bound on iterations per `run_market_round` call.
    pub max_orders_per_round: u32,
}

impl ChainParams {
    /// Fee charged by `update_balance_vote`: half of [`Self::precision`].
    pub fn vote_update_fee(&self) -> i64 {
        self.precision / 2
    }
}

impl Default for ChainParams {
    /// Reference values, chosen to match the magnitudes named in spec §8's
    /// worked examples (a `min_burn_fee` test case, a `precision`-derived
    /// vote fee). Any real deployment overrides these via `ledger-cli`'s
    /// config file; the core never hardcodes them past this default.
    fn default() -> Self {
        ChainParams {
            min_yield_period: 60 * 60 * 24,       // 1 day
            max_yield_period: 60 * 60 * 24 * 365, // 1 year
            max_slate_size: 40,
            vote_update_period: 60 * 60 * 24,
            max_short_period: 60 * 60 * 24 * 30, // 30 days
            precision: 100_000_000,              // 10^8
            min_burn_fee: 100_000,
            max_shares: 1_000_000_000_000_000,
            exchange_fee_bps: 50, // 0.5%
            margin_call_ratio_bps: 11_000, // 110%
            max_orders_per_round: 10_000,
        }
    }
}
