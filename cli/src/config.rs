//! Chain-parameter configuration, read from a `toml` file the way the
//! teacher's `NetworkConfig` reads its network settings — minus any
//! network/RPC shape, since this core never talks to a chain over the
//! wire (spec §1 non-goal).

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use ledger_common::params::ChainParams;

#[derive(Debug, Default, Deserialize)]
pub struct ParamsFile {
    pub min_yield_period: Option<i64>,
    pub max_yield_period: Option<i64>,
    pub max_slate_size: Option<usize>,
    pub vote_update_period: Option<i64>,
    pub max_short_period: Option<i64>,
    pub precision: Option<i64>,
    pub min_burn_fee: Option<i64>,
    pub max_shares: Option<i64>,
    pub exchange_fee_bps: Option<i64>,
    pub margin_call_ratio_bps: Option<i64>,
    pub max_orders_per_round: Option<u32>,
}

impl ParamsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    pub fn into_chain_params(self) -> ChainParams {
        let default = ChainParams::default();
        ChainParams {
            min_yield_period: self.min_yield_period.unwrap_or(default.min_yield_period),
            max_yield_period: self.max_yield_period.unwrap_or(default.max_yield_period),
            max_slate_size: self.max_slate_size.unwrap_or(default.max_slate_size),
            vote_update_period: self.vote_update_period.unwrap_or(default.vote_update_period),
            max_short_period: self.max_short_period.unwrap_or(default.max_short_period),
            precision: self.precision.unwrap_or(default.precision),
            min_burn_fee: self.min_burn_fee.unwrap_or(default.min_burn_fee),
            max_shares: self.max_shares.unwrap_or(default.max_shares),
            exchange_fee_bps: self.exchange_fee_bps.unwrap_or(default.exchange_fee_bps),
            margin_call_ratio_bps: self.margin_call_ratio_bps.unwrap_or(default.margin_call_ratio_bps),
            max_orders_per_round: self.max_orders_per_round.unwrap_or(default.max_orders_per_round),
        }
    }
}

/// Loads `ChainParams` from an optional config file, falling back to the
/// reference defaults when none is given (or when the scenario file
/// carries its own `params` block, which takes precedence — see
/// `scenario::ScenarioFile::params`).
pub fn load_params(path: Option<&Path>) -> Result<ChainParams> {
    match path {
        Some(path) => Ok(ParamsFile::load(path)?.into_chain_params()),
        None => Ok(ChainParams::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let params = load_params(None).unwrap();
        assert_eq!(params, ChainParams::default());
    }
}
