//! Entity records (spec §3): assets, balances, withdraw conditions, slates,
//! orders, collateral, burns, and market history. These are plain data —
//! every invariant-enforcing mutation lives in `ledger-core`, not here.

use ledger_ids::{digest, AccountId, Address, AssetId, BalanceId, SlateId, TransactionId};

/// Feature flags carried on an [`AssetRecord`] (spec §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetFlags {
    /// Issued by the matching engine against collateral (shorts/covers);
    /// never a slate-voting balance (spec §3 invariant).
    pub market_issued: bool,
    /// Every owner implied by a balance's condition must be authorised.
    pub restricted: bool,
    /// `authority` may override the freeze on withdraw/release_escrow.
    pub retractable: bool,
    /// No withdrawal succeeds against this asset without the override.
    pub balance_frozen: bool,
}

/// An M-of-N key set empowered to act for a retractable asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    pub owners: Vec<Address>,
    pub required: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub id: AssetId,
    pub current_share_supply: i64,
    /// Yield pool for market-issued assets; retains exchange fees too.
    pub collected_fees: i64,
    pub authority: Authority,
    pub flags: AssetFlags,
}

impl AssetRecord {
    pub fn is_market_issued(&self) -> bool {
        self.flags.market_issued
    }

    pub fn is_restricted(&self) -> bool {
        self.flags.restricted
    }

    pub fn is_retractable(&self) -> bool {
        self.flags.retractable
    }

    pub fn is_balance_frozen(&self) -> bool {
        self.flags.balance_frozen
    }
}

/// The predicate that must be satisfied to spend a balance. Its content
/// hash is the balance's identity (spec §3, §9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawCondition {
    Signature {
        owner: Address,
    },
    Multisig {
        required: u32,
        owners: Vec<Address>,
    },
    /// Linearly unlocks from zero at `start_date` to the full balance at
    /// `start_date + duration_secs`; spendable balance is capped at the
    /// unlocked fraction (spec §4.2 withdraw).
    Vesting {
        owner: Address,
        start_date: i64,
        duration_secs: i64,
    },
    Escrow {
        sender: Address,
        receiver: Address,
        escrow: Address,
    },
    Password {
        payor: Address,
        payee: Address,
        timeout: i64,
        password_hash: [u8; 20],
    },
}

impl WithdrawCondition {
    /// Every address whose authorisation is relevant to this condition
    /// (used for restricted-asset checks and multi-owner signature
    /// collection; spec §4.2).
    pub fn owners(&self) -> Vec<Address> {
        match self {
            WithdrawCondition::Signature { owner } => vec![*owner],
            WithdrawCondition::Vesting { owner, .. } => vec![*owner],
            WithdrawCondition::Multisig { owners, .. } => owners.clone(),
            WithdrawCondition::Escrow {
                sender,
                receiver,
                escrow,
            } => vec![*sender, *receiver, *escrow],
            WithdrawCondition::Password { payor, payee, .. } => vec![*payor, *payee],
        }
    }

    /// The owner to carry forward when a balance is rewritten into a new
    /// plain-signature condition (`update_balance_vote`, spec §4.2). Only
    /// defined for the condition kinds that can hold delegate slates.
    pub fn signature_owner(&self) -> Option<Address> {
        match self {
            WithdrawCondition::Signature { owner } => Some(*owner),
            _ => None,
        }
    }

    fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            WithdrawCondition::Signature { owner } => {
                buf.push(0u8);
                buf.extend_from_slice(&owner.0 .0);
            }
            WithdrawCondition::Multisig { required, owners } => {
                buf.push(1u8);
                buf.extend_from_slice(&required.to_le_bytes());
                for o in owners {
                    buf.extend_from_slice(&o.0 .0);
                }
            }
            WithdrawCondition::Vesting {
                owner,
                start_date,
                duration_secs,
            } => {
                buf.push(2u8);
                buf.extend_from_slice(&owner.0 .0);
                buf.extend_from_slice(&start_date.to_le_bytes());
                buf.extend_from_slice(&duration_secs.to_le_bytes());
            }
            WithdrawCondition::Escrow {
                sender,
                receiver,
                escrow,
            } => {
                buf.push(3u8);
                buf.extend_from_slice(&sender.0 .0);
                buf.extend_from_slice(&receiver.0 .0);
                buf.extend_from_slice(&escrow.0 .0);
            }
            WithdrawCondition::Password {
                payor,
                payee,
                timeout,
                password_hash,
            } => {
                buf.push(4u8);
                buf.extend_from_slice(&payor.0 .0);
                buf.extend_from_slice(&payee.0 .0);
                buf.extend_from_slice(&timeout.to_le_bytes());
                buf.extend_from_slice(password_hash);
            }
        }
        buf
    }
}

/// A condition paired with the asset it spends and an optional vote slate —
/// together this is what `balance_id()` hashes (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawConditionWithAsset {
    pub condition: WithdrawCondition,
    pub asset_id: AssetId,
    pub slate_id: Option<SlateId>,
}

impl WithdrawConditionWithAsset {
    pub fn new(condition: WithdrawCondition, asset_id: AssetId, slate_id: Option<SlateId>) -> Self {
        WithdrawConditionWithAsset {
            condition,
            asset_id,
            slate_id,
        }
    }

    pub fn balance_id(&self) -> BalanceId {
        let mut buf = self.condition.canonical_bytes();
        buf.extend_from_slice(&self.asset_id.to_le_bytes());
        if let Some(slate) = self.slate_id {
            buf.push(1);
            buf.extend_from_slice(&slate.0 .0);
        } else {
            buf.push(0);
        }
        BalanceId(digest(&buf))
    }
}

/// Closed set of what `meta_data` may carry (spec §9) — replaces the
/// original's free-form object with a small enum so new variants are an
/// explicit, reviewable addition rather than silent dynamic typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceMetaData {
    CreatingTransaction(TransactionId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRecord {
    pub condition: WithdrawConditionWithAsset,
    pub balance: i64,
    pub deposit_date: i64,
    pub last_update: i64,
    pub restricted_owner: Option<Address>,
    pub meta_data: Option<BalanceMetaData>,
}

impl BalanceRecord {
    pub fn new(condition: WithdrawConditionWithAsset, now: i64) -> Self {
        BalanceRecord {
            condition,
            balance: 0,
            deposit_date: now,
            last_update: now,
            restricted_owner: None,
            meta_data: None,
        }
    }

    pub fn id(&self) -> BalanceId {
        self.condition.balance_id()
    }

    pub fn owners(&self) -> Vec<Address> {
        self.condition.condition.owners()
    }

    /// Amount available to withdraw right now, after vesting throttling
    /// (spec §4.2 withdraw: "vesting conditions reduce spendable").
    pub fn spendable_balance(&self, now: i64) -> i64 {
        match &self.condition.condition {
            WithdrawCondition::Vesting {
                start_date,
                duration_secs,
                ..
            } => {
                if *duration_secs <= 0 || now >= start_date + duration_secs {
                    self.balance
                } else if now <= *start_date {
                    0
                } else {
                    let elapsed = (now - start_date) as i128;
                    let duration = *duration_secs as i128;
                    let unlocked = (self.balance as i128 * elapsed) / duration;
                    unlocked.min(self.balance as i128) as i64
                }
            }
            _ => self.balance,
        }
    }
}

/// Sorted, strictly-ascending list of delegate account ids (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slate {
    pub delegates: Vec<AccountId>,
}

impl Slate {
    pub fn is_sorted_ascending(&self) -> bool {
        self.delegates.windows(2).all(|w| w[0] < w[1])
    }

    pub fn id(&self) -> SlateId {
        let mut buf = Vec::with_capacity(self.delegates.len() * 8);
        for d in &self.delegates {
            buf.extend_from_slice(&d.to_le_bytes());
        }
        SlateId(digest(&buf))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Ask,
    Bid,
    /// A short offers `collateral_pool` base units backing new debt, never
    /// filled above `price_limit` (spec §4.6 bid selection).
    Short {
        collateral_pool: i64,
        interest_rate: i64,
    },
}

/// A resting ask/bid/short entry, keyed by `(quote, base, price, owner)`
/// (spec §3). `sequence` breaks ties between same-price orders from
/// different owners deterministically (insertion order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub owner: Address,
    pub quote: AssetId,
    pub base: AssetId,
    pub kind: OrderKind,
    pub price: i64,
    pub quantity: i64,
    pub sequence: u64,
}

/// Open collateralised debt created by a matched short (spec §3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralRecord {
    pub owner: Address,
    pub quote: AssetId,
    pub base: AssetId,
    pub collateral_balance: i64,
    pub payoff_balance: i64,
    pub interest_rate: i64,
    pub expiration: i64,
    pub origination: i64,
}

impl CollateralRecord {
    /// The price at which collateral barely covers debt at the required
    /// ratio; above this, the feed price margin-calls the position
    /// (spec §4.6 ask selection).
    pub fn call_price(&self, required_ratio_bps: i64) -> Option<i64> {
        if self.collateral_balance <= 0 {
            return None;
        }
        let numerator = (self.payoff_balance as i128) * (required_ratio_bps as i128);
        let denominator = (self.collateral_balance as i128) * 10_000;
        if denominator == 0 {
            None
        } else {
            Some(((numerator * crate::math::PRICE_SCALE as i128) / denominator) as i64)
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expiration
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnRecord {
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
    pub amount: i64,
    pub message: String,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHistoryEntry {
    pub quote: AssetId,
    pub base: AssetId,
    pub timestamp: i64,
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
    pub volume: i64,
}

/// A completed trade produced by one matching-engine step (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketTransaction {
    pub quote: AssetId,
    pub base: AssetId,
    pub bid_owner: Address,
    pub ask_owner: Address,
    pub base_amount: i64,
    pub quote_amount: i64,
    pub fee: i64,
    pub price: i64,
    pub origin: TradeOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeOrigin {
    BidAsk,
    BidShort,
    CoverAsk,
    CoverBid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address(digest(&[b]))
    }

    #[test]
    fn balance_id_is_stable_for_identical_conditions() {
        let c1 = WithdrawConditionWithAsset::new(
            WithdrawCondition::Signature { owner: addr(1) },
            0,
            None,
        );
        let c2 = WithdrawConditionWithAsset::new(
            WithdrawCondition::Signature { owner: addr(1) },
            0,
            None,
        );
        assert_eq!(c1.balance_id(), c2.balance_id());
    }

    #[test]
    fn balance_id_differs_on_asset() {
        let c1 = WithdrawConditionWithAsset::new(
            WithdrawCondition::Signature { owner: addr(1) },
            0,
            None,
        );
        let c2 = WithdrawConditionWithAsset::new(
            WithdrawCondition::Signature { owner: addr(1) },
            1,
            None,
        );
        assert_ne!(c1.balance_id(), c2.balance_id());
    }

    #[test]
    fn slate_rejects_unsorted() {
        let s = Slate {
            delegates: vec![3, 1, 2],
        };
        assert!(!s.is_sorted_ascending());
    }

    #[test]
    fn vesting_unlocks_linearly() {
        let record = BalanceRecord {
            condition: WithdrawConditionWithAsset::new(
                WithdrawCondition::Vesting {
                    owner: addr(1),
                    start_date: 0,
                    duration_secs: 1000,
                },
                0,
                None,
            ),
            balance: 1000,
            deposit_date: 0,
            last_update: 0,
            restricted_owner: None,
            meta_data: None,
        };
        assert_eq!(record.spendable_balance(0), 0);
        assert_eq!(record.spendable_balance(500), 500);
        assert_eq!(record.spendable_balance(1000), 1000);
        assert_eq!(record.spendable_balance(2000), 1000);
    }
}
