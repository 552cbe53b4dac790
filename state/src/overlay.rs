//! The pending overlay (spec §4.1, §5): a write buffer over
//! [`InMemoryChainState`] that the evaluator mutates freely and the caller
//! either commits (merging every buffered write back into the base) or
//! drops (discarding them, leaving the base untouched). This is the
//! "scoped acquisition that guarantees release on every exit path" spec §5
//! describes: `evaluate_transaction` takes `&mut dyn ChainStateView`, and a
//! caller that gets `Err` back simply never calls [`PendingOverlay::commit`].
//!
//! Only the five record kinds the balance engine's seven operations touch
//! (balances, assets, slates, vote tallies, burns) are buffered here. Order
//! book, collateral, and market-history writes pass straight through to the
//! base: those are driven exclusively by `run_market_round`, which is its
//! own top-level call rather than a nested transaction needing a second
//! rollback boundary (spec §2's data flow names it as a separate per-round
//! step, not a sub-step of transaction evaluation).

use std::collections::HashMap;

use ledger_common::records::{
    AssetRecord, BalanceRecord, BurnRecord, CollateralRecord, MarketHistoryEntry, OrderRecord, Slate,
};
use ledger_common::view::{AskCandidate, BidCandidate, ChainStateView, OrderKindTag};
use ledger_ids::{AccountId, Address, AssetId, BalanceId, SlateId};

use crate::store::InMemoryChainState;

pub struct PendingOverlay<'a> {
    base: &'a mut InMemoryChainState,
    balances: HashMap<BalanceId, BalanceRecord>,
    assets: HashMap<AssetId, AssetRecord>,
    slates: HashMap<SlateId, Slate>,
    vote_deltas: HashMap<SlateId, i64>,
    burns: Vec<BurnRecord>,
}

impl<'a> PendingOverlay<'a> {
    pub fn new(base: &'a mut InMemoryChainState) -> Self {
        PendingOverlay {
            base,
            balances: HashMap::new(),
            assets: HashMap::new(),
            slates: HashMap::new(),
            vote_deltas: HashMap::new(),
            burns: Vec::new(),
        }
    }

    /// Merges every buffered write into the base store. Call this only
    /// after `evaluate_transaction` returns `Ok` — on `Err`, drop the
    /// overlay instead and nothing written to it ever becomes visible.
    pub fn commit(self) {
        let PendingOverlay {
            base,
            balances,
            assets,
            slates,
            vote_deltas,
            burns,
        } = self;
        for record in balances.into_values() {
            base.store_balance_record(record);
        }
        for record in assets.into_values() {
            base.store_asset_record(record);
        }
        for slate in slates.into_values() {
            base.store_delegate_slate(slate);
        }
        for (slate, delta) in vote_deltas {
            base.adjust_vote(slate, delta);
        }
        for record in burns {
            base.store_burn_record(record);
        }
    }
}

impl<'a> ChainStateView for PendingOverlay<'a> {
    fn now(&self) -> i64 {
        self.base.now()
    }

    fn get_balance_record(&self, id: BalanceId) -> Option<BalanceRecord> {
        self.balances.get(&id).cloned().or_else(|| self.base.get_balance_record(id))
    }

    fn store_balance_record(&mut self, record: BalanceRecord) {
        self.balances.insert(record.id(), record);
    }

    fn get_asset_record(&self, id: AssetId) -> Option<AssetRecord> {
        self.assets.get(&id).cloned().or_else(|| self.base.get_asset_record(id))
    }

    fn store_asset_record(&mut self, record: AssetRecord) {
        self.assets.insert(record.id, record);
    }

    fn account_exists(&self, id: AccountId) -> bool {
        self.base.account_exists(id)
    }

    fn get_authorization(&self, asset: AssetId, owner: Address) -> bool {
        self.base.get_authorization(asset, owner)
    }

    fn get_delegate_slate(&self, id: SlateId) -> Option<Slate> {
        self.slates.get(&id).cloned().or_else(|| self.base.get_delegate_slate(id))
    }

    fn store_delegate_slate(&mut self, slate: Slate) {
        self.slates.insert(slate.id(), slate);
    }

    fn store_burn_record(&mut self, record: BurnRecord) {
        self.burns.push(record);
    }

    fn adjust_vote(&mut self, slate: SlateId, delta: i64) {
        *self.vote_deltas.entry(slate).or_insert(0) += delta;
    }

    fn vote_tally(&self, slate: SlateId) -> i64 {
        self.base.vote_tally(slate) + self.vote_deltas.get(&slate).copied().unwrap_or(0)
    }

    fn best_ask(
        &self,
        quote: AssetId,
        base: AssetId,
        feed_price: Option<i64>,
        call_ratio_bps: i64,
    ) -> Option<AskCandidate> {
        self.base.best_ask(quote, base, feed_price, call_ratio_bps)
    }

    fn best_bid(&self, quote: AssetId, base: AssetId, feed_price: Option<i64>) -> Option<BidCandidate> {
        self.base.best_bid(quote, base, feed_price)
    }

    fn store_order(&mut self, order: OrderRecord) {
        self.base.store_order(order);
    }

    fn remove_order(&mut self, quote: AssetId, base: AssetId, owner: Address, kind: OrderKindTag, price: i64) {
        self.base.remove_order(quote, base, owner, kind, price);
    }

    fn reduce_order(
        &mut self,
        quote: AssetId,
        base: AssetId,
        owner: Address,
        kind: OrderKindTag,
        price: i64,
        remaining: i64,
    ) {
        self.base.reduce_order(quote, base, owner, kind, price, remaining);
    }

    fn get_collateral(&self, quote: AssetId, base: AssetId, owner: Address) -> Option<CollateralRecord> {
        self.base.get_collateral(quote, base, owner)
    }

    fn store_collateral(&mut self, record: CollateralRecord) {
        self.base.store_collateral(record);
    }

    fn remove_collateral(&mut self, quote: AssetId, base: AssetId, owner: Address) {
        self.base.remove_collateral(quote, base, owner);
    }

    fn record_market_history(&mut self, entry: MarketHistoryEntry) {
        self.base.record_market_history(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_common::records::{WithdrawCondition, WithdrawConditionWithAsset};
    use ledger_ids::digest;

    fn addr(b: u8) -> Address {
        Address(digest(&[b]))
    }

    #[test]
    fn dropped_overlay_never_touches_base() {
        let mut base = InMemoryChainState::new(0);
        {
            let mut overlay = PendingOverlay::new(&mut base);
            let condition = WithdrawConditionWithAsset::new(WithdrawCondition::Signature { owner: addr(1) }, 0, None);
            let mut record = BalanceRecord::new(condition, 0);
            record.balance = 500;
            overlay.store_balance_record(record);
            // overlay dropped here without commit()
        }
        let condition = WithdrawConditionWithAsset::new(WithdrawCondition::Signature { owner: addr(1) }, 0, None);
        assert!(base.get_balance_record(condition.balance_id()).is_none());
    }

    #[test]
    fn committed_overlay_merges_into_base() {
        let mut base = InMemoryChainState::new(0);
        let condition = WithdrawConditionWithAsset::new(WithdrawCondition::Signature { owner: addr(1) }, 0, None);
        let id = condition.balance_id();
        {
            let mut overlay = PendingOverlay::new(&mut base);
            let mut record = BalanceRecord::new(condition, 0);
            record.balance = 500;
            overlay.store_balance_record(record);
            overlay.commit();
        }
        assert_eq!(base.get_balance_record(id).unwrap().balance, 500);
    }

    #[test]
    fn vote_tally_sees_base_plus_overlay_delta() {
        let mut base = InMemoryChainState::new(0);
        let slate = Slate { delegates: vec![1, 2] };
        let id = slate.id();
        base.adjust_vote(id, 100);
        let mut overlay = PendingOverlay::new(&mut base);
        overlay.adjust_vote(id, -30);
        assert_eq!(overlay.vote_tally(id), 70);
    }
}
