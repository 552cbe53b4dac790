//! Matching engine (spec §4.6): advances one `(quote, base)` order book by
//! repeatedly pairing the best bid against the best ask until no further
//! pairing is possible, producing market transactions and mutating orders,
//! balances, and collateral records in the pending overlay.
//!
//! Order placement itself is out of scope (spec §1/§6 name only seven
//! operations for the balance engine; "place order" is a registration-like
//! operation this core accepts verbatim without modeling). Concretely that
//! means a resting [`OrderRecord`] is treated as already-committed
//! liquidity: this engine only produces the *credits* a trade earns, it
//! never debits a separate "locked" pool for the loser side of a fill.

use ledger_common::error::{LedgerError, LedgerResult};
use ledger_common::math::{checked_div, mul_i64, PRICE_SCALE};
use ledger_common::params::ChainParams;
use ledger_common::records::{
    CollateralRecord, MarketHistoryEntry, MarketTransaction, OrderKind, OrderRecord, TradeOrigin,
};
use ledger_common::view::{AskCandidate, BidCandidate, ChainStateView, OrderKindTag};
use ledger_ids::{Address, AssetId};

use crate::balance::credit_recipient;

const SECONDS_PER_YEAR: i64 = 365 * 24 * 60 * 60;

/// Simple interest owed on `principal` at `apr_bps` over `age_seconds`
/// (spec §4.6, ported from `market_engine.hpp`'s static interest helpers).
fn get_interest_owed(principal: i64, apr_bps: i64, age_seconds: i64) -> i64 {
    if principal <= 0 || apr_bps <= 0 || age_seconds <= 0 {
        return 0;
    }
    let p = principal as i128;
    let apr = apr_bps as i128;
    let age = age_seconds as i128;
    ((p * apr * age) / (10_000 * SECONDS_PER_YEAR as i128)) as i64
}

/// Splits a `payoff_amount` into the portion retiring principal vs
/// interest, interest paid first (spec §4.6: "interest is retained as
/// fees").
fn get_interest_paid(payoff_amount: i64, principal: i64, apr_bps: i64, age_seconds: i64) -> (i64, i64) {
    let owed_interest = get_interest_owed(principal, apr_bps, age_seconds);
    let interest_paid = payoff_amount.min(owed_interest);
    let principal_paid = (payoff_amount - interest_paid).min(principal);
    (principal_paid, interest_paid)
}

fn scale_quote(base_qty: i64, price: i64) -> LedgerResult<i64> {
    let product = mul_i64(base_qty, price);
    let scaled = checked_div(product, PRICE_SCALE as i128).unwrap_or(0);
    i64::try_from(scaled).map_err(|_| LedgerError::Overflow {
        context: "quote amount scaling",
    })
}

fn apply_fee_bps(amount: i64, bps: i64) -> i64 {
    checked_div(mul_i64(amount, bps), 10_000).unwrap_or(0) as i64
}

/// Credits a plain signature balance with `amount`, used for trade
/// proceeds and collateral refunds — never attached to a slate, since
/// matching-engine credits are not user-submitted votes.
fn credit_owner(view: &mut dyn ChainStateView, asset_id: AssetId, owner: Address, amount: i64, now: i64) -> LedgerResult<()> {
    if amount <= 0 {
        return Ok(());
    }
    credit_recipient(view, asset_id, owner, None, amount, now)
}

fn add_collected_fees(view: &mut dyn ChainStateView, asset_id: AssetId, amount: i64) -> LedgerResult<()> {
    if amount <= 0 {
        return Ok(());
    }
    let mut asset = view
        .get_asset_record(asset_id)
        .ok_or(LedgerError::UnknownAssetRecord(asset_id))?;
    asset.collected_fees = asset
        .collected_fees
        .checked_add(amount)
        .ok_or(LedgerError::Overflow {
            context: "collected_fees credit",
        })?;
    view.store_asset_record(asset);
    Ok(())
}

/// Merges a freshly created collateral increment into any existing
/// position for the same `(quote, base, owner)` — a short order may be
/// filled across several matching-loop iterations, each contributing its
/// own slice of collateral and debt (spec §4.6 doesn't name a merge rule
/// explicitly; this keeps one open position per owner per market instead
/// of silently overwriting an earlier slice).
fn merge_collateral(view: &mut dyn ChainStateView, increment: CollateralRecord) {
    match view.get_collateral(increment.quote, increment.base, increment.owner) {
        Some(mut existing) => {
            let total_payoff = existing.payoff_balance + increment.payoff_balance;
            if total_payoff > 0 {
                existing.interest_rate = ((existing.interest_rate as i128
                    * existing.payoff_balance as i128
                    + increment.interest_rate as i128 * increment.payoff_balance as i128)
                    / total_payoff as i128) as i64;
            }
            existing.collateral_balance += increment.collateral_balance;
            existing.payoff_balance = total_payoff;
            existing.expiration = increment.expiration;
            existing.origination = increment.origination;
            view.store_collateral(existing);
        }
        None => view.store_collateral(increment),
    }
}

/// Releases `qty` base units of `collateral` against an incoming payment
/// of `qty` priced at `trade_price`, retiring principal/interest pro-rata
/// and returning any surplus to the collateral's owner (spec §4.6:
/// "releases collateral pro-rata as debt is retired").
fn cover_step(
    view: &mut dyn ChainStateView,
    now: i64,
    mut collateral: CollateralRecord,
    qty: i64,
    trade_price: i64,
    payer: Address,
) -> LedgerResult<(i64, i64)> {
    let quote_amount = scale_quote(qty, trade_price)?;
    let age = (now - collateral.origination).max(0);
    let (principal_paid, interest_paid) =
        get_interest_paid(quote_amount, collateral.payoff_balance, collateral.interest_rate, age);

    collateral.payoff_balance = (collateral.payoff_balance - principal_paid).max(0);
    collateral.collateral_balance = (collateral.collateral_balance - qty).max(0);

    let refund = quote_amount - principal_paid - interest_paid;
    if refund > 0 {
        credit_owner(view, collateral.quote, collateral.owner, refund, now)?;
    }
    add_collected_fees(view, collateral.quote, interest_paid)?;
    credit_owner(view, collateral.base, payer, qty, now)?;

    if collateral.payoff_balance <= 0 {
        if collateral.collateral_balance > 0 {
            credit_owner(view, collateral.base, collateral.owner, collateral.collateral_balance, now)?;
        }
        view.remove_collateral(collateral.quote, collateral.base, collateral.owner);
    } else {
        view.store_collateral(collateral);
    }
    Ok((quote_amount, interest_paid))
}

struct RoundAccumulator {
    open: i64,
    high: i64,
    low: i64,
    close: i64,
    volume: i64,
    any: bool,
}

impl RoundAccumulator {
    fn new() -> Self {
        RoundAccumulator {
            open: 0,
            high: i64::MIN,
            low: i64::MAX,
            close: 0,
            volume: 0,
            any: false,
        }
    }

    fn record(&mut self, price: i64, base_amount: i64) {
        if !self.any {
            self.open = price;
        }
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume = self.volume.saturating_add(base_amount);
        self.any = true;
    }
}

/// Advances one `(quote, base)` order book at `now`, pairing the best bid
/// against the best ask until no pairing is possible (spec §4.6). Returns
/// whether any trade executed. `feed_price` is the oracle median for
/// `quote`; `None` disables the short and margin-call streams entirely
/// (spec §4.6).
pub fn run_market_round(
    view: &mut dyn ChainStateView,
    params: &ChainParams,
    quote: AssetId,
    base: AssetId,
    now: i64,
    feed_price: Option<i64>,
) -> LedgerResult<bool> {
    let mut orders_filled: u32 = 0;
    let mut round = RoundAccumulator::new();

    loop {
        if orders_filled >= params.max_orders_per_round {
            break;
        }

        let ask = view.best_ask(quote, base, feed_price, params.margin_call_ratio_bps);
        let bid = view.best_bid(quote, base, feed_price);
        let (ask, bid) = match (ask, bid) {
            (Some(a), Some(b)) => (a, b),
            _ => break,
        };
        if bid.price() < ask.price() {
            break;
        }
        let trade_price = ask.price();

        let ask_is_cover = matches!(&ask, AskCandidate::MarginCall { .. } | AskCandidate::ExpiredCover { .. });
        let bid_is_short = matches!(&bid, BidCandidate::Short { .. });
        let origin = match (ask_is_cover, bid_is_short) {
            (false, false) => TradeOrigin::BidAsk,
            (false, true) => TradeOrigin::BidShort,
            (true, false) => TradeOrigin::CoverBid,
            (true, true) => TradeOrigin::CoverAsk,
        };

        let traded = match (bid, ask) {
            (BidCandidate::Order(bid_order), AskCandidate::Order(ask_order)) => {
                ordinary_step(view, params, now, quote, base, bid_order, ask_order, trade_price)?
            }
            (BidCandidate::Short { order: short_order, .. }, AskCandidate::Order(ask_order)) => {
                short_step(view, params, now, quote, base, short_order, ask_order, trade_price)?
            }
            (BidCandidate::Order(bid_order), AskCandidate::MarginCall { collateral, .. })
            | (BidCandidate::Order(bid_order), AskCandidate::ExpiredCover { collateral, .. }) => {
                cover_with_order_step(view, now, bid_order, collateral, trade_price)?
            }
            (BidCandidate::Short { order: short_order, .. }, AskCandidate::MarginCall { collateral, .. })
            | (BidCandidate::Short { order: short_order, .. }, AskCandidate::ExpiredCover { collateral, .. }) => {
                cover_with_short_step(view, now, short_order, collateral, trade_price)?
            }
        };

        let Some((base_amount, quote_amount, fee, bid_owner, ask_owner)) = traded else {
            // Edge policy: zero base or quote at this price granularity —
            // skip rather than loop forever on dust (spec §4.6).
            break;
        };

        log::debug!(
            "{:?}",
            MarketTransaction {
                quote,
                base,
                bid_owner,
                ask_owner,
                base_amount,
                quote_amount,
                fee,
                price: trade_price,
                origin,
            }
        );

        round.record(trade_price, base_amount);
        orders_filled += 1;
    }

    if round.any {
        view.record_market_history(MarketHistoryEntry {
            quote,
            base,
            timestamp: now,
            open: round.open,
            high: round.high,
            low: round.low,
            close: round.close,
            volume: round.volume,
        });
    }

    Ok(round.any)
}

type TradeOutcome = Option<(i64, i64, i64, Address, Address)>;

/// Ordinary ask × ordinary bid (spec §4.6 "bid×ask"): both sides are
/// resting orders; the exchange fee routes to the quote asset's
/// `collected_fees`.
fn ordinary_step(
    view: &mut dyn ChainStateView,
    params: &ChainParams,
    now: i64,
    quote: AssetId,
    base: AssetId,
    mut bid_order: OrderRecord,
    mut ask_order: OrderRecord,
    trade_price: i64,
) -> LedgerResult<TradeOutcome> {
    let qty = bid_order.quantity.min(ask_order.quantity);
    let quote_amount = scale_quote(qty, trade_price)?;
    if qty <= 0 || quote_amount <= 0 {
        remove_or_reduce(view, quote, base, &bid_order, OrderKindTag::Bid, 0);
        remove_or_reduce(view, quote, base, &ask_order, OrderKindTag::Ask, 0);
        return Ok(None);
    }

    let fee = apply_fee_bps(quote_amount, params.exchange_fee_bps);
    add_collected_fees(view, quote, fee)?;
    credit_owner(view, quote, ask_order.owner, quote_amount - fee, now)?;
    credit_owner(view, base, bid_order.owner, qty, now)?;

    bid_order.quantity -= qty;
    ask_order.quantity -= qty;
    remove_or_reduce(view, quote, base, &bid_order, OrderKindTag::Bid, bid_order.quantity);
    remove_or_reduce(view, quote, base, &ask_order, OrderKindTag::Ask, ask_order.quantity);

    Ok(Some((qty, quote_amount, fee, bid_order.owner, ask_order.owner)))
}

/// Ordinary ask × short bid (spec §4.6 "bid×short"): the short creates a
/// new collateral record instead of paying quote directly. Collateral
/// contributed is proportional to the slice of the short filled this step,
/// preserving the short's declared collateral-to-quantity ratio across
/// partial fills.
fn short_step(
    view: &mut dyn ChainStateView,
    params: &ChainParams,
    now: i64,
    quote: AssetId,
    base: AssetId,
    mut short_order: OrderRecord,
    mut ask_order: OrderRecord,
    trade_price: i64,
) -> LedgerResult<TradeOutcome> {
    let (collateral_pool, interest_rate) = match short_order.kind {
        OrderKind::Short {
            collateral_pool,
            interest_rate,
        } => (collateral_pool, interest_rate),
        _ => {
            return Err(LedgerError::InvalidWithdrawCondition {
                reason: "short_step requires a Short-kind order",
            })
        }
    };

    let qty = short_order.quantity.min(ask_order.quantity);
    let quote_amount = scale_quote(qty, trade_price)?;
    if qty <= 0 || quote_amount <= 0 {
        remove_or_reduce(view, quote, base, &ask_order, OrderKindTag::Ask, 0);
        remove_or_reduce_short(view, quote, base, &short_order, 0, 0);
        return Ok(None);
    }

    let contributed = if short_order.quantity > 0 {
        ((collateral_pool as i128) * (qty as i128) / (short_order.quantity as i128)) as i64
    } else {
        0
    };

    credit_owner(view, quote, ask_order.owner, quote_amount, now)?;

    merge_collateral(
        view,
        CollateralRecord {
            owner: short_order.owner,
            quote,
            base,
            collateral_balance: qty + contributed,
            payoff_balance: quote_amount,
            interest_rate,
            expiration: now + params.max_short_period,
            origination: now,
        },
    );

    ask_order.quantity -= qty;
    remove_or_reduce(view, quote, base, &ask_order, OrderKindTag::Ask, ask_order.quantity);

    short_order.quantity -= qty;
    let remaining_pool = collateral_pool - contributed;
    remove_or_reduce_short(view, quote, base, &short_order, short_order.quantity, remaining_pool);

    Ok(Some((qty, quote_amount, 0, short_order.owner, ask_order.owner)))
}

/// Margin-called/expired collateral (the synthetic "cover" ask) × ordinary
/// bid (spec §4.6 "cover×bid"): the bid buys the collateral's base,
/// retiring debt pro-rata.
fn cover_with_order_step(
    view: &mut dyn ChainStateView,
    now: i64,
    mut bid_order: OrderRecord,
    collateral: CollateralRecord,
    trade_price: i64,
) -> LedgerResult<TradeOutcome> {
    let qty = bid_order.quantity.min(collateral.collateral_balance);
    if qty <= 0 {
        return Ok(None);
    }
    let owner = collateral.owner;
    let quote = collateral.quote;
    let base = collateral.base;
    let (quote_paid, interest_paid) = cover_step(view, now, collateral, qty, trade_price, bid_order.owner)?;
    if quote_paid <= 0 {
        return Ok(None);
    }

    bid_order.quantity -= qty;
    remove_or_reduce(view, quote, base, &bid_order, OrderKindTag::Bid, bid_order.quantity);

    Ok(Some((qty, quote_paid, interest_paid, bid_order.owner, owner)))
}

/// Margin-called/expired collateral × short bid (spec §4.6 "cover×ask"):
/// the new short simultaneously opens its own position and retires the
/// existing one it crossed.
fn cover_with_short_step(
    view: &mut dyn ChainStateView,
    now: i64,
    mut short_order: OrderRecord,
    collateral: CollateralRecord,
    trade_price: i64,
) -> LedgerResult<TradeOutcome> {
    let qty = short_order.quantity.min(collateral.collateral_balance);
    if qty <= 0 {
        return Ok(None);
    }
    let owner = collateral.owner;
    let quote = collateral.quote;
    let base = collateral.base;
    let (quote_paid, interest_paid) = cover_step(view, now, collateral, qty, trade_price, short_order.owner)?;
    if quote_paid <= 0 {
        return Ok(None);
    }

    short_order.quantity -= qty;
    let (collateral_pool, _) = match short_order.kind {
        OrderKind::Short { collateral_pool, .. } => (collateral_pool, ()),
        _ => (0, ()),
    };
    remove_or_reduce_short(view, quote, base, &short_order, short_order.quantity, collateral_pool);

    Ok(Some((qty, quote_paid, interest_paid, short_order.owner, owner)))
}

fn remove_or_reduce(
    view: &mut dyn ChainStateView,
    quote: AssetId,
    base: AssetId,
    order: &OrderRecord,
    kind: OrderKindTag,
    remaining: i64,
) {
    if remaining > 0 {
        view.reduce_order(quote, base, order.owner, kind, order.price, remaining);
    } else {
        view.remove_order(quote, base, order.owner, kind, order.price);
    }
}

fn remove_or_reduce_short(
    view: &mut dyn ChainStateView,
    quote: AssetId,
    base: AssetId,
    order: &OrderRecord,
    remaining_qty: i64,
    remaining_pool: i64,
) {
    if remaining_qty > 0 && remaining_pool > 0 {
        let mut updated = order.clone();
        updated.quantity = remaining_qty;
        if let OrderKind::Short { interest_rate, .. } = updated.kind {
            updated.kind = OrderKind::Short {
                collateral_pool: remaining_pool,
                interest_rate,
            };
        }
        view.store_order(updated);
    } else {
        view.remove_order(quote, base, order.owner, OrderKindTag::Short, order.price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_paid_takes_interest_first() {
        let (principal, interest) = get_interest_paid(1_100, 1_000, 1_000, SECONDS_PER_YEAR);
        assert_eq!(interest, 100);
        assert_eq!(principal, 1_000);
    }

    #[test]
    fn interest_paid_caps_at_payoff_amount() {
        let (principal, interest) = get_interest_paid(50, 1_000, 1_000, SECONDS_PER_YEAR);
        assert_eq!(interest, 50);
        assert_eq!(principal, 0);
    }

    #[test]
    fn scale_quote_applies_price_scale() {
        assert_eq!(scale_quote(2 * PRICE_SCALE, PRICE_SCALE).unwrap(), 2 * PRICE_SCALE);
    }
}
