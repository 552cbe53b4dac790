//! The chain-state view contract (spec §4.1): get/store accessors for
//! every entity kind, plus the order-book selection primitives the
//! matching engine drives. `ledger-core` is generic over this trait and
//! never sees concrete storage; `ledger-state` is the only crate that
//! implements it.

use crate::records::{
    AssetRecord, BalanceRecord, BurnRecord, CollateralRecord, MarketHistoryEntry, OrderRecord,
    Slate,
};
use ledger_ids::{AccountId, Address, AssetId, BalanceId, SlateId};

/// Tag used to address a specific resting order for removal/reduction,
/// since (quote, base, price, owner) does not uniquely distinguish a short
/// from an ask/bid at the same nominal price (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKindTag {
    Ask,
    Bid,
    Short,
}

/// The current best ask across the three streams of spec §4.6: an
/// ordinary resting ask, a margin-called collateral record treated as a
/// synthetic ask, or an expired cover treated as an ask at the feed price.
#[derive(Debug, Clone)]
pub enum AskCandidate {
    Order(OrderRecord),
    MarginCall {
        collateral: CollateralRecord,
        price: i64,
    },
    ExpiredCover {
        collateral: CollateralRecord,
        price: i64,
    },
}

impl AskCandidate {
    pub fn price(&self) -> i64 {
        match self {
            AskCandidate::Order(o) => o.price,
            AskCandidate::MarginCall { price, .. } => *price,
            AskCandidate::ExpiredCover { price, .. } => *price,
        }
    }

    /// Ordinary ask < margin-call < expired cover (spec §4.6 tie-break).
    pub fn tie_break_rank(&self) -> u8 {
        match self {
            AskCandidate::Order(_) => 0,
            AskCandidate::MarginCall { .. } => 1,
            AskCandidate::ExpiredCover { .. } => 2,
        }
    }
}

/// The current best bid across the two streams of spec §4.6: an ordinary
/// resting bid, or a short re-priced to the feed cap.
#[derive(Debug, Clone)]
pub enum BidCandidate {
    Order(OrderRecord),
    Short {
        order: OrderRecord,
        effective_price: i64,
    },
}

impl BidCandidate {
    pub fn price(&self) -> i64 {
        match self {
            BidCandidate::Order(o) => o.price,
            BidCandidate::Short { effective_price, .. } => *effective_price,
        }
    }
}

/// Read/write access to every entity kind, layered so a pending view can
/// overlay a committed view (spec §4.1). All evaluator and matching-engine
/// code works exclusively against this trait.
pub trait ChainStateView {
    /// The block timestamp being evaluated. Never wall-clock (spec §5).
    fn now(&self) -> i64;

    fn get_balance_record(&self, id: BalanceId) -> Option<BalanceRecord>;
    fn store_balance_record(&mut self, record: BalanceRecord);

    fn get_asset_record(&self, id: AssetId) -> Option<AssetRecord>;
    fn store_asset_record(&mut self, record: AssetRecord);

    fn account_exists(&self, id: AccountId) -> bool;

    /// Membership in a restricted asset's allow-list (spec §4.1).
    fn get_authorization(&self, asset: AssetId, owner: Address) -> bool;

    fn get_delegate_slate(&self, id: SlateId) -> Option<Slate>;
    fn store_delegate_slate(&mut self, slate: Slate);

    fn store_burn_record(&mut self, record: BurnRecord);

    /// Adjusts the running vote tally for a slate by `delta` (spec §4.4).
    fn adjust_vote(&mut self, slate: SlateId, delta: i64);
    fn vote_tally(&self, slate: SlateId) -> i64;

    // --- order book (spec §4.6) -------------------------------------
    fn best_ask(
        &self,
        quote: AssetId,
        base: AssetId,
        feed_price: Option<i64>,
        call_ratio_bps: i64,
    ) -> Option<AskCandidate>;

    fn best_bid(&self, quote: AssetId, base: AssetId, feed_price: Option<i64>) -> Option<BidCandidate>;

    fn store_order(&mut self, order: OrderRecord);

    fn remove_order(
        &mut self,
        quote: AssetId,
        base: AssetId,
        owner: Address,
        kind: OrderKindTag,
        price: i64,
    );

    /// Sets the remaining quantity of a resting order in place.
    fn reduce_order(
        &mut self,
        quote: AssetId,
        base: AssetId,
        owner: Address,
        kind: OrderKindTag,
        price: i64,
        remaining: i64,
    );

    fn get_collateral(&self, quote: AssetId, base: AssetId, owner: Address) -> Option<CollateralRecord>;
    fn store_collateral(&mut self, record: CollateralRecord);
    fn remove_collateral(&mut self, quote: AssetId, base: AssetId, owner: Address);

    /// Write-only from the matching engine's perspective (spec §4.5).
    fn record_market_history(&mut self, entry: MarketHistoryEntry);
}
