//! Scenario file format: the genesis state and the transactions/market
//! rounds to run against it, loaded with `serde_json` (spec §6). This is
//! the CLI's only way to build a [`ledger_state::InMemoryChainState`] —
//! there is no wallet or RPC surface to pull state from instead.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use ripemd::{Digest as _, Ripemd160};
use serde::Deserialize;

use ledger_common::params::ChainParams;
use ledger_common::view::ChainStateView;
use ledger_common::records::{
    AssetFlags, AssetRecord, Authority, CollateralRecord, OrderKind, OrderRecord, Slate,
    WithdrawCondition, WithdrawConditionWithAsset,
};
use ledger_core::balance::{
    BurnInput, DepositInput, PayFeeInput, ReleaseEscrowInput, ReleasedBy, UpdateBalanceVoteInput, WithdrawInput,
};
use ledger_core::{Operation, Transaction};
use ledger_ids::{digest, Address, AssetId, SlateId, TransactionId};
use ledger_state::InMemoryChainState;

/// Deterministically maps a human-readable name to the [`Address`] every
/// operation in the scenario file refers to it by. There is no keypair
/// here (spec §1 non-goal): a scenario just needs the same name to always
/// hash to the same owner.
pub fn named_owner(name: &str) -> Address {
    Address(digest(name.as_bytes()))
}

fn slate_id_of(delegates: &Option<Vec<i64>>) -> Option<SlateId> {
    delegates.as_ref().map(|d| Slate { delegates: d.clone() }.id())
}

#[derive(Debug, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub now: i64,
    #[serde(default)]
    pub params: Option<ParamsSeed>,
    #[serde(default)]
    pub assets: Vec<AssetSeed>,
    #[serde(default)]
    pub accounts: Vec<i64>,
    #[serde(default)]
    pub authorizations: Vec<AuthSeed>,
    #[serde(default)]
    pub balances: Vec<BalanceSeed>,
    #[serde(default)]
    pub orders: Vec<OrderSeed>,
    #[serde(default)]
    pub collateral: Vec<CollateralSeed>,
    #[serde(default)]
    pub transactions: Vec<TransactionSeed>,
    #[serde(default)]
    pub market_rounds: Vec<MarketRoundSeed>,
}

#[derive(Debug, Deserialize)]
pub struct ParamsSeed {
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

impl ParamsSeed {
    fn into_params(self) -> ChainParams {
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

#[derive(Debug, Deserialize)]
pub struct AssetSeed {
    pub id: AssetId,
    pub supply: i64,
    #[serde(default)]
    pub market_issued: bool,
    #[serde(default)]
    pub restricted: bool,
    #[serde(default)]
    pub retractable: bool,
    #[serde(default)]
    pub balance_frozen: bool,
    #[serde(default)]
    pub authority_owners: Vec<String>,
    #[serde(default)]
    pub authority_required: u32,
}

#[derive(Debug, Deserialize)]
pub struct AuthSeed {
    pub asset: AssetId,
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub struct BalanceSeed {
    pub owner: String,
    pub asset_id: AssetId,
    pub amount: i64,
    #[serde(default)]
    pub deposit_date: i64,
    #[serde(default)]
    pub slate: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKindSeed {
    Ask,
    Bid,
    Short { collateral_pool: i64, interest_rate: i64 },
}

#[derive(Debug, Deserialize)]
pub struct OrderSeed {
    pub owner: String,
    pub quote: AssetId,
    pub base: AssetId,
    pub kind: OrderKindSeed,
    pub price: i64,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CollateralSeed {
    pub owner: String,
    pub quote: AssetId,
    pub base: AssetId,
    pub collateral_balance: i64,
    pub payoff_balance: i64,
    pub interest_rate: i64,
    pub expiration: i64,
    pub origination: i64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionSeed {
    Signature { owner: String },
    Multisig { owners: Vec<String>, required: u32 },
    Vesting { owner: String, start_date: i64, duration_secs: i64 },
    Escrow { sender: String, receiver: String, escrow: String },
    Password { payor: String, payee: String, timeout: i64, password: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationSeed {
    Deposit {
        condition: ConditionSeed,
        asset_id: AssetId,
        #[serde(default)]
        slate: Option<Vec<i64>>,
        amount: i64,
    },
    Withdraw {
        condition: ConditionSeed,
        asset_id: AssetId,
        #[serde(default)]
        slate: Option<Vec<i64>>,
        amount: i64,
        #[serde(default)]
        claim_preimage: Option<String>,
        #[serde(default)]
        retractable_override: bool,
    },
    Burn {
        amount: i64,
        asset_id: AssetId,
        #[serde(default)]
        account_id: i64,
        #[serde(default)]
        message: String,
    },
    ReleaseEscrow {
        escrow_condition: ConditionSeed,
        asset_id: AssetId,
        #[serde(default)]
        slate: Option<Vec<i64>>,
        amount_to_sender: i64,
        amount_to_receiver: i64,
        released_by: String,
    },
    UpdateBalanceVote {
        owner: String,
        #[serde(default)]
        slate: Option<Vec<i64>>,
        new_slate: Option<Vec<i64>>,
        new_restricted_owner: Option<String>,
    },
    PayFee {
        asset_id: AssetId,
        amount: i64,
    },
    DefineDelegateSlate {
        delegates: Vec<i64>,
    },
}

#[derive(Debug, Deserialize)]
pub struct TransactionSeed {
    #[serde(default)]
    pub signers: Vec<String>,
    pub operations: Vec<OperationSeed>,
}

#[derive(Debug, Deserialize)]
pub struct MarketRoundSeed {
    pub quote: AssetId,
    pub base: AssetId,
    pub feed_price: Option<i64>,
}

impl ScenarioFile {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario file: {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse scenario file: {}", path.display()))
    }

    pub fn params(&self) -> ChainParams {
        self.params
            .as_ref()
            .map(|p| ParamsSeed {
                min_yield_period: p.min_yield_period,
                max_yield_period: p.max_yield_period,
                max_slate_size: p.max_slate_size,
                vote_update_period: p.vote_update_period,
                max_short_period: p.max_short_period,
                precision: p.precision,
                min_burn_fee: p.min_burn_fee,
                max_shares: p.max_shares,
                exchange_fee_bps: p.exchange_fee_bps,
                margin_call_ratio_bps: p.margin_call_ratio_bps,
                max_orders_per_round: p.max_orders_per_round,
            }
            .into_params())
            .unwrap_or_default()
    }

    /// Builds the committed store described by `assets`/`accounts`/
    /// `authorizations`/`balances`/`orders`/`collateral` — the genesis
    /// state every transaction and market round in the file runs against.
    pub fn build_state(&self) -> Result<InMemoryChainState> {
        let mut state = InMemoryChainState::new(self.now);

        for asset in &self.assets {
            state.register_asset(AssetRecord {
                id: asset.id,
                current_share_supply: asset.supply,
                collected_fees: 0,
                authority: Authority {
                    owners: asset.authority_owners.iter().map(|o| named_owner(o)).collect(),
                    required: asset.authority_required,
                },
                flags: AssetFlags {
                    market_issued: asset.market_issued,
                    restricted: asset.restricted,
                    retractable: asset.retractable,
                    balance_frozen: asset.balance_frozen,
                },
            });
        }
        for account in &self.accounts {
            state.register_account(*account);
        }
        for auth in &self.authorizations {
            state.authorize(auth.asset, named_owner(&auth.owner));
        }
        for balance in &self.balances {
            let condition = WithdrawConditionWithAsset::new(
                WithdrawCondition::Signature { owner: named_owner(&balance.owner) },
                balance.asset_id,
                slate_id_of(&balance.slate),
            );
            let mut record = ledger_common::records::BalanceRecord::new(condition, balance.deposit_date);
            record.balance = balance.amount;
            record.last_update = balance.deposit_date;
            state.store_balance_record(record);
        }
        for order in &self.orders {
            let kind = match &order.kind {
                OrderKindSeed::Ask => OrderKind::Ask,
                OrderKindSeed::Bid => OrderKind::Bid,
                OrderKindSeed::Short { collateral_pool, interest_rate } => OrderKind::Short {
                    collateral_pool: *collateral_pool,
                    interest_rate: *interest_rate,
                },
            };
            state.place_order(OrderRecord {
                owner: named_owner(&order.owner),
                quote: order.quote,
                base: order.base,
                kind,
                price: order.price,
                quantity: order.quantity,
                sequence: 0,
            });
        }
        for collateral in &self.collateral {
            state.store_collateral(CollateralRecord {
                owner: named_owner(&collateral.owner),
                quote: collateral.quote,
                base: collateral.base,
                collateral_balance: collateral.collateral_balance,
                payoff_balance: collateral.payoff_balance,
                interest_rate: collateral.interest_rate,
                expiration: collateral.expiration,
                origination: collateral.origination,
            });
        }

        Ok(state)
    }

    /// Decodes the `index`-th transaction entry into the evaluator's own
    /// [`Transaction`] type, keyed by a transaction id derived from its
    /// position in the file (spec §1 excludes signing/id-assignment from
    /// this core — the CLI stands in for whatever submits transactions).
    pub fn transaction(&self, index: usize) -> Result<Transaction> {
        let seed = self
            .transactions
            .get(index)
            .with_context(|| format!("scenario has no transaction at index {index}"))?;

        let id = TransactionId(digest(format!("tx-{index}").as_bytes()));
        let signatures: HashSet<Address> = seed.signers.iter().map(|s| named_owner(s)).collect();
        let mut operations = Vec::with_capacity(seed.operations.len());
        for op in &seed.operations {
            operations.push(decode_operation(op)?);
        }
        Ok(Transaction { id, signatures, operations })
    }
}

fn decode_operation(op: &OperationSeed) -> Result<Operation> {
    Ok(match op {
        OperationSeed::Deposit { condition, asset_id, slate, amount } => {
            let condition = WithdrawConditionWithAsset::new(
                clone_condition(condition),
                *asset_id,
                slate_id_of(slate),
            );
            Operation::Deposit(DepositInput { condition, amount: *amount })
        }
        OperationSeed::Withdraw {
            condition,
            asset_id,
            slate,
            amount,
            claim_preimage,
            retractable_override,
        } => {
            let condition = WithdrawConditionWithAsset::new(
                clone_condition(condition),
                *asset_id,
                slate_id_of(slate),
            );
            Operation::Withdraw(WithdrawInput {
                balance_id: condition.balance_id(),
                amount: *amount,
                claim_preimage: claim_preimage.as_ref().map(|p| p.as_bytes().to_vec()),
                retractable_override: *retractable_override,
            })
        }
        OperationSeed::Burn { amount, asset_id, account_id, message } => {
            Operation::Burn(BurnInput {
                amount: *amount,
                asset_id: *asset_id,
                account_id: *account_id,
                message: message.clone(),
                signature: Vec::new(),
                tx_id: TransactionId(digest(b"burn")),
            })
        }
        OperationSeed::ReleaseEscrow {
            escrow_condition,
            asset_id,
            slate,
            amount_to_sender,
            amount_to_receiver,
            released_by,
        } => {
            let condition = WithdrawConditionWithAsset::new(
                clone_condition(escrow_condition),
                *asset_id,
                slate_id_of(slate),
            );
            let released_by = match released_by.as_str() {
                "sender" => ReleasedBy::Sender,
                "receiver" => ReleasedBy::Receiver,
                "arbiter" => ReleasedBy::Arbiter,
                "mutual" => ReleasedBy::Mutual,
                other => bail!("unknown released_by variant: {other}"),
            };
            Operation::ReleaseEscrow(ReleaseEscrowInput {
                escrow_balance_id: condition.balance_id(),
                amount_to_sender: *amount_to_sender,
                amount_to_receiver: *amount_to_receiver,
                released_by,
            })
        }
        OperationSeed::UpdateBalanceVote { owner, slate, new_slate, new_restricted_owner } => {
            let condition = WithdrawConditionWithAsset::new(
                WithdrawCondition::Signature { owner: named_owner(owner) },
                ledger_ids::BASE_ASSET_ID,
                slate_id_of(slate),
            );
            Operation::UpdateBalanceVote(UpdateBalanceVoteInput {
                balance_id: condition.balance_id(),
                new_slate_id: slate_id_of(new_slate),
                new_restricted_owner: new_restricted_owner.as_ref().map(|o| named_owner(o)),
            })
        }
        OperationSeed::PayFee { asset_id, amount } => {
            Operation::PayFee(PayFeeInput { asset_id: *asset_id, amount: *amount })
        }
        OperationSeed::DefineDelegateSlate { delegates } => {
            Operation::DefineDelegateSlate(Slate { delegates: delegates.clone() })
        }
    })
}

fn clone_condition(seed: &ConditionSeed) -> WithdrawCondition {
    // ConditionSeed has no Clone derive (serde enums with owned Strings);
    // operations only ever read one condition each, so re-derive it from
    // a manual field copy rather than threading Clone through the DTO.
    match seed {
        ConditionSeed::Signature { owner } => WithdrawCondition::Signature { owner: named_owner(owner) },
        ConditionSeed::Multisig { owners, required } => WithdrawCondition::Multisig {
            required: *required,
            owners: owners.iter().map(|o| named_owner(o)).collect(),
        },
        ConditionSeed::Vesting { owner, start_date, duration_secs } => WithdrawCondition::Vesting {
            owner: named_owner(owner),
            start_date: *start_date,
            duration_secs: *duration_secs,
        },
        ConditionSeed::Escrow { sender, receiver, escrow } => WithdrawCondition::Escrow {
            sender: named_owner(sender),
            receiver: named_owner(receiver),
            escrow: named_owner(escrow),
        },
        ConditionSeed::Password { payor, payee, timeout, password } => {
            let mut hasher = Ripemd160::new();
            hasher.update(password.as_bytes());
            let out = hasher.finalize();
            let mut password_hash = [0u8; 20];
            password_hash.copy_from_slice(&out);
            WithdrawCondition::Password {
                payor: named_owner(payor),
                payee: named_owner(payee),
                timeout: *timeout,
                password_hash,
            }
        }
    }
}
