//! Transaction evaluator (spec §4.4): drives the operations of one
//! transaction in declared order through the balance engine, folds their
//! effects into per-asset accumulators, and checks the net movement is a
//! legal fee before letting the caller commit the overlay.

use std::collections::{HashMap, HashSet};

use ledger_common::error::{LedgerError, LedgerResult};
use ledger_common::params::ChainParams;
use ledger_common::records::Slate;
use ledger_common::view::ChainStateView;
use ledger_ids::{Address, AssetId, TransactionId};

use crate::balance::{
    self, BurnInput, DepositInput, OpEffect, PayFeeInput, ReleaseEscrowInput, UpdateBalanceVoteInput,
    WithdrawInput,
};

/// One operation of the variant named in spec §6. Registration/market
/// operations are accepted verbatim by a real evaluator but are out of
/// scope here (spec §1) — this enum only names the seven this core
/// actually evaluates.
pub enum Operation {
    Deposit(DepositInput),
    Withdraw(WithdrawInput),
    Burn(BurnInput),
    ReleaseEscrow(ReleaseEscrowInput),
    UpdateBalanceVote(UpdateBalanceVoteInput),
    PayFee(PayFeeInput),
    DefineDelegateSlate(Slate),
}

/// A decoded transaction: an id, the operations to evaluate in order, and
/// the signatures already verified by the caller (spec §1 excludes signing
/// itself from this core's scope).
pub struct Transaction {
    pub id: TransactionId,
    pub signatures: HashSet<Address>,
    pub operations: Vec<Operation>,
}

/// What `evaluate_transaction` returns on success: the realised fee per
/// asset, i.e. `funds_out - funds_in - yield`, which becomes the block
/// producer's reward for including the transaction (spec §4.4).
#[derive(Debug, Default, Clone)]
pub struct EvaluationResult {
    pub realised_fee: HashMap<AssetId, i128>,
}

/// Owns the per-transaction accumulators while operations are evaluated
/// against a pending view. Never constructed with a committed view
/// directly — the caller is expected to hand in an overlay it can discard
/// on `Err`.
pub struct TransactionEvaluator<'a> {
    view: &'a mut dyn ChainStateView,
    params: &'a ChainParams,
    tx_id: TransactionId,
    signatures: HashSet<Address>,
    funds_in: HashMap<AssetId, i128>,
    funds_out: HashMap<AssetId, i128>,
    max_fee: HashMap<AssetId, i128>,
    yield_paid: HashMap<AssetId, i128>,
}

impl<'a> TransactionEvaluator<'a> {
    pub fn new(
        view: &'a mut dyn ChainStateView,
        params: &'a ChainParams,
        tx_id: TransactionId,
        signatures: HashSet<Address>,
    ) -> Self {
        TransactionEvaluator {
            view,
            params,
            tx_id,
            signatures,
            funds_in: HashMap::new(),
            funds_out: HashMap::new(),
            max_fee: HashMap::new(),
            yield_paid: HashMap::new(),
        }
    }

    fn fold(&mut self, effect: OpEffect) {
        for (asset, amount) in effect.funds_in {
            *self.funds_in.entry(asset).or_insert(0) += amount;
        }
        for (asset, amount) in effect.funds_out {
            *self.funds_out.entry(asset).or_insert(0) += amount;
        }
        for (asset, amount) in effect.yield_paid {
            *self.yield_paid.entry(asset).or_insert(0) += amount;
        }
    }

    /// Applies one operation, folding its effect into the running
    /// accumulators. Returns the first error encountered; the caller must
    /// treat that as fatal to the whole transaction (spec §4.2).
    pub fn apply(&mut self, op: Operation) -> LedgerResult<()> {
        match op {
            Operation::Deposit(input) => {
                let effect = balance::deposit(self.view, self.tx_id, input)?;
                self.fold(effect);
            }
            Operation::Withdraw(input) => {
                let effect =
                    balance::withdraw(self.view, self.params, &self.signatures, input)?;
                self.fold(effect);
            }
            Operation::Burn(input) => {
                let effect = balance::burn(self.view, self.params, input)?;
                self.fold(effect);
            }
            Operation::ReleaseEscrow(input) => {
                let effect = balance::release_escrow(self.view, &self.signatures, input)?;
                self.fold(effect);
            }
            Operation::UpdateBalanceVote(input) => {
                let effect = balance::update_balance_vote(
                    self.view,
                    self.params,
                    &self.signatures,
                    input,
                )?;
                self.fold(effect);
            }
            Operation::PayFee(input) => {
                let (asset, amount) = balance::pay_fee(input);
                *self.max_fee.entry(asset).or_insert(0) += amount as i128;
            }
            Operation::DefineDelegateSlate(slate) => {
                balance::define_delegate_slate(self.view, self.params, slate)?;
            }
        }
        Ok(())
    }

    /// Checks every asset touched satisfies `0 <= funds_out - funds_in -
    /// yield <= max_fee` (spec §4.4) and returns the realised fee. Consumes
    /// the evaluator: once finished, the pending overlay is ready for the
    /// caller to commit.
    pub fn finish(self) -> LedgerResult<EvaluationResult> {
        let mut touched: HashSet<AssetId> = HashSet::new();
        touched.extend(self.funds_in.keys().copied());
        touched.extend(self.funds_out.keys().copied());
        touched.extend(self.max_fee.keys().copied());
        touched.extend(self.yield_paid.keys().copied());

        let mut realised_fee = HashMap::new();
        for asset in touched {
            let funds_in = *self.funds_in.get(&asset).unwrap_or(&0);
            let funds_out = *self.funds_out.get(&asset).unwrap_or(&0);
            let yield_paid = *self.yield_paid.get(&asset).unwrap_or(&0);
            let max_fee = *self.max_fee.get(&asset).unwrap_or(&0);

            let net = funds_out - funds_in - yield_paid;
            if net < 0 {
                return Err(LedgerError::NegativeNetMovement { asset, net });
            }
            if net > max_fee {
                return Err(LedgerError::FeeExceedsDeclared {
                    asset,
                    declared: max_fee as i64,
                });
            }
            realised_fee.insert(asset, net);
        }

        Ok(EvaluationResult { realised_fee })
    }
}

/// Sole entry point named in spec §6 for operations: evaluates every
/// operation of `tx` against `view` in declared order, returning the
/// realised fee on success. On any error the caller must discard whatever
/// overlay `view` is backed by — this function makes no attempt to undo
/// writes already made to it.
pub fn evaluate_transaction(
    tx: Transaction,
    view: &mut dyn ChainStateView,
    params: &ChainParams,
) -> LedgerResult<EvaluationResult> {
    let mut evaluator = TransactionEvaluator::new(view, params, tx.id, tx.signatures);
    for op in tx.operations {
        evaluator.apply(op)?;
    }
    evaluator.finish()
}
