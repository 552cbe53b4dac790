//! Order-book storage key and the candidate-selection helpers behind
//! [`ledger_common::view::ChainStateView::best_ask`] /
//! `best_bid` (spec §4.6).
//!
//! The book itself is an ordinary `BTreeMap` rather than the teacher's
//! fixed-capacity on-chain array (`crates/model_safety/src/orderbook.rs`'s
//! `MAX_ORDERS_PER_SIDE`-bounded slab) — off-chain storage has no account
//! size ceiling, so the bound becomes `ChainParams::max_orders_per_round`
//! (an iteration cap on a round, not a capacity cap on the book).

use ledger_common::records::{CollateralRecord, OrderKind, OrderRecord};
use ledger_common::view::{AskCandidate, BidCandidate};
use ledger_ids::{Address, AssetId};

/// Sort/lookup key for a resting order. `sequence` is assigned at
/// placement time and is the deterministic tie-break the spec requires for
/// same-price orders (insertion order, never wall-clock).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    pub quote: AssetId,
    pub base: AssetId,
    pub kind: u8,
    pub price: i64,
    pub sequence: u64,
    pub owner: Address,
}

pub const KIND_ASK: u8 = 0;
pub const KIND_BID: u8 = 1;
pub const KIND_SHORT: u8 = 2;

pub fn kind_tag(order: &OrderRecord) -> u8 {
    match order.kind {
        OrderKind::Ask => KIND_ASK,
        OrderKind::Bid => KIND_BID,
        OrderKind::Short { .. } => KIND_SHORT,
    }
}

/// The floor below which a synthetic (margin-call/expired-cover) ask is
/// refused, preventing below-floor execution on the cover/call paths
/// (spec §4.6: "feed price scaled by 0.9").
pub fn minimum_synthetic_ask(feed_price: i64) -> i64 {
    ((feed_price as i128 * 9) / 10) as i64
}

/// Ascending-price ordinary ask with the lowest `sequence` among ties
/// (spec §4.6 ask selection, stream 1).
pub fn next_ask_order<'a>(
    orders: impl Iterator<Item = (&'a OrderKey, &'a OrderRecord)>,
    quote: AssetId,
    base: AssetId,
) -> Option<OrderRecord> {
    orders
        .filter(|(k, _)| k.quote == quote && k.base == base && k.kind == KIND_ASK)
        .min_by_key(|(k, _)| (k.price, k.sequence))
        .map(|(_, o)| o.clone())
}

/// Descending-price ordinary bid with the lowest `sequence` among ties
/// (spec §4.6 bid selection, stream 1).
pub fn next_bid_order<'a>(
    orders: impl Iterator<Item = (&'a OrderKey, &'a OrderRecord)>,
    quote: AssetId,
    base: AssetId,
) -> Option<OrderRecord> {
    orders
        .filter(|(k, _)| k.quote == quote && k.base == base && k.kind == KIND_BID)
        .max_by_key(|(k, _)| (k.price, std::cmp::Reverse(k.sequence)))
        .map(|(_, o)| o.clone())
}

/// The most aggressive short, re-slotted to the feed cap when its own
/// limit sits above it (spec §4.6: "Shorts above the feed price are
/// re-slotted as 'short at feed' and capped at feed"). Ties on effective
/// price break on ascending owner, mirroring the `(price_limit, owner)`
/// sort key the spec names for the short stream.
pub fn next_short<'a>(
    orders: impl Iterator<Item = (&'a OrderKey, &'a OrderRecord)>,
    quote: AssetId,
    base: AssetId,
    feed_price: i64,
) -> Option<(OrderRecord, i64)> {
    orders
        .filter(|(k, _)| k.quote == quote && k.base == base && k.kind == KIND_SHORT)
        .map(|(k, o)| (o.clone(), k.price.min(feed_price), k.owner))
        .max_by_key(|(_, effective, owner)| (*effective, std::cmp::Reverse(*owner)))
        .map(|(o, effective, _)| (o, effective))
}

/// The most urgent margin call: the collateral record whose call price
/// clears furthest above the feed (worst-collateralised first), among
/// those that clear it at all (spec §4.6 ask selection, stream 2).
pub fn next_margin_call<'a>(
    collateral: impl Iterator<Item = &'a CollateralRecord>,
    quote: AssetId,
    base: AssetId,
    feed_price: i64,
    call_ratio_bps: i64,
) -> Option<(CollateralRecord, i64)> {
    collateral
        .filter(|c| c.quote == quote && c.base == base)
        .filter_map(|c| {
            let call_price = c.call_price(call_ratio_bps)?;
            (call_price > feed_price).then_some((c, call_price))
        })
        .max_by_key(|(c, call_price)| (*call_price, std::cmp::Reverse(c.owner)))
        .map(|(c, _)| (*c, feed_price.max(minimum_synthetic_ask(feed_price))))
}

/// The oldest expired cover, treated as an ask at the feed price (spec
/// §4.6 ask selection, stream 3).
pub fn next_expired_cover<'a>(
    collateral: impl Iterator<Item = &'a CollateralRecord>,
    quote: AssetId,
    base: AssetId,
    now: i64,
    feed_price: i64,
) -> Option<(CollateralRecord, i64)> {
    collateral
        .filter(|c| c.quote == quote && c.base == base && c.is_expired(now))
        .min_by_key(|c| (c.origination, std::cmp::Reverse(c.owner)))
        .map(|c| (*c, feed_price))
}

/// Combines the three ask streams into spec §4.6's selection: minimum
/// price wins, ties break ordinary < margin-call < expired-cover, and
/// synthetic asks below `minimum_synthetic_ask(feed)` are dropped entirely.
pub fn select_ask(
    ordinary: Option<OrderRecord>,
    margin_call: Option<(CollateralRecord, i64)>,
    expired_cover: Option<(CollateralRecord, i64)>,
    feed_price: Option<i64>,
) -> Option<AskCandidate> {
    let floor = feed_price.map(minimum_synthetic_ask);
    let above_floor = |price: i64| floor.map_or(true, |f| price >= f);

    let mut candidates = Vec::new();
    if let Some(order) = ordinary {
        candidates.push(AskCandidate::Order(order));
    }
    if let Some((collateral, price)) = margin_call {
        if above_floor(price) {
            candidates.push(AskCandidate::MarginCall { collateral, price });
        }
    }
    if let Some((collateral, price)) = expired_cover {
        if above_floor(price) {
            candidates.push(AskCandidate::ExpiredCover { collateral, price });
        }
    }

    candidates
        .into_iter()
        .min_by_key(|c| (c.price(), c.tie_break_rank()))
}

/// Combines the two bid streams into spec §4.6's selection: maximum
/// (effective) price wins.
pub fn select_bid(ordinary: Option<OrderRecord>, short: Option<(OrderRecord, i64)>) -> Option<BidCandidate> {
    let mut candidates = Vec::new();
    if let Some(order) = ordinary {
        candidates.push(BidCandidate::Order(order));
    }
    if let Some((order, effective_price)) = short {
        candidates.push(BidCandidate::Short { order, effective_price });
    }
    candidates.into_iter().max_by_key(|c| c.price())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_ids::digest;

    fn addr(b: u8) -> Address {
        Address(digest(&[b]))
    }

    fn order(owner: Address, kind: OrderKind, price: i64, sequence: u64) -> (OrderKey, OrderRecord) {
        let record = OrderRecord {
            owner,
            quote: 1,
            base: 0,
            kind,
            price,
            quantity: 100,
            sequence,
        };
        let key = OrderKey {
            quote: 1,
            base: 0,
            kind: kind_tag(&record),
            price,
            sequence,
            owner,
        };
        (key, record)
    }

    #[test]
    fn ask_selection_prefers_lowest_price() {
        let (k1, o1) = order(addr(1), OrderKind::Ask, 200, 0);
        let (k2, o2) = order(addr(2), OrderKind::Ask, 100, 1);
        let map = [(k1, o1), (k2, o2)];
        let best = next_ask_order(map.iter().map(|(k, v)| (k, v)), 1, 0).unwrap();
        assert_eq!(best.price, 100);
    }

    #[test]
    fn bid_selection_prefers_highest_price() {
        let (k1, o1) = order(addr(1), OrderKind::Bid, 100, 0);
        let (k2, o2) = order(addr(2), OrderKind::Bid, 200, 1);
        let map = [(k1, o1), (k2, o2)];
        let best = next_bid_order(map.iter().map(|(k, v)| (k, v)), 1, 0).unwrap();
        assert_eq!(best.price, 200);
    }

    #[test]
    fn tie_break_prefers_ordinary_ask_over_margin_call() {
        let ask = OrderRecord {
            owner: addr(1),
            quote: 1,
            base: 0,
            kind: OrderKind::Ask,
            price: 100,
            quantity: 10,
            sequence: 0,
        };
        let collateral = CollateralRecord {
            owner: addr(2),
            quote: 1,
            base: 0,
            collateral_balance: 10,
            payoff_balance: 10,
            interest_rate: 0,
            expiration: 1000,
            origination: 0,
        };
        let best = select_ask(Some(ask), Some((collateral, 100)), None, Some(100)).unwrap();
        assert_eq!(best.tie_break_rank(), 0);
    }

    #[test]
    fn synthetic_ask_below_floor_is_dropped() {
        let collateral = CollateralRecord {
            owner: addr(2),
            quote: 1,
            base: 0,
            collateral_balance: 10,
            payoff_balance: 10,
            interest_rate: 0,
            expiration: 1000,
            origination: 0,
        };
        // feed = 100 -> floor = 90; synthetic price 80 is below floor.
        let best = select_ask(None, Some((collateral, 80)), None, Some(100));
        assert!(best.is_none());
    }
}
