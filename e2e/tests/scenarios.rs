//! End-to-end scenario tests: the literal worked examples of spec §8,
//! driven through `evaluate_transaction`/`run_market_round` against a real
//! `ledger_state::InMemoryChainState` rather than a mocked view.

use std::collections::HashSet;

use ledger_common::error::LedgerError;
use ledger_common::params::ChainParams;
use ledger_common::records::{
    AssetFlags, AssetRecord, Authority, Slate, WithdrawCondition, WithdrawConditionWithAsset,
};
use ledger_common::view::ChainStateView;
use ledger_core::balance::{DepositInput, PayFeeInput, ReleaseEscrowInput, ReleasedBy, UpdateBalanceVoteInput, WithdrawInput};
use ledger_core::evaluator::{evaluate_transaction, Operation, Transaction};
use ledger_ids::{digest, Address, AssetId, TransactionId, BASE_ASSET_ID};
use ledger_state::{InMemoryChainState, PendingOverlay};

fn owner(tag: &str) -> Address {
    Address(digest(tag.as_bytes()))
}

fn base_coin() -> AssetRecord {
    AssetRecord {
        id: BASE_ASSET_ID,
        current_share_supply: 1_000_000_000,
        collected_fees: 0,
        authority: Authority { owners: vec![], required: 0 },
        flags: AssetFlags::default(),
    }
}

fn tx_id(tag: &str) -> TransactionId {
    TransactionId(digest(tag.as_bytes()))
}

fn run(state: &mut InMemoryChainState, params: &ChainParams, tag: &str, signers: &[Address], ops: Vec<Operation>) -> Result<(), LedgerError> {
    let mut overlay = PendingOverlay::new(state);
    let tx = Transaction {
        id: tx_id(tag),
        signatures: signers.iter().copied().collect::<HashSet<_>>(),
        operations: ops,
    };
    let result = evaluate_transaction(tx, &mut overlay, params);
    match result {
        Ok(_) => {
            overlay.commit();
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn signature_balance_id(owner: Address, asset: AssetId) -> ledger_ids::BalanceId {
    WithdrawConditionWithAsset::new(WithdrawCondition::Signature { owner }, asset, None).balance_id()
}

#[test]
fn deposit_avg_scenario_matches_spec() {
    // A deposit only balances a transaction's per-asset net movement (spec
    // §4.4) when paired with a withdraw of the same amount elsewhere in it
    // — exactly how a plain transfer is built from the two primitives. This
    // scenario models that as a withdraw from a pre-funded faucet balance
    // into alice's account.
    let params = ChainParams::default();
    let mut state = InMemoryChainState::new(0);
    state.register_asset(base_coin());
    let alice = owner("alice");
    let faucet = owner("faucet");

    let faucet_condition = WithdrawConditionWithAsset::new(WithdrawCondition::Signature { owner: faucet }, BASE_ASSET_ID, None);
    let faucet_id = faucet_condition.balance_id();
    let mut faucet_record = ledger_common::records::BalanceRecord::new(faucet_condition, 0);
    faucet_record.balance = 1_000;
    state.store_balance_record(faucet_record);

    run(
        &mut state,
        &params,
        "deposit-1",
        &[faucet],
        vec![
            Operation::Withdraw(WithdrawInput { balance_id: faucet_id, amount: 100, claim_preimage: None, retractable_override: false }),
            Operation::Deposit(DepositInput {
                condition: WithdrawConditionWithAsset::new(WithdrawCondition::Signature { owner: alice }, BASE_ASSET_ID, None),
                amount: 100,
            }),
        ],
    )
    .unwrap();

    state.set_now(1000);
    run(
        &mut state,
        &params,
        "deposit-2",
        &[faucet],
        vec![
            Operation::Withdraw(WithdrawInput { balance_id: faucet_id, amount: 300, claim_preimage: None, retractable_override: false }),
            Operation::Deposit(DepositInput {
                condition: WithdrawConditionWithAsset::new(WithdrawCondition::Signature { owner: alice }, BASE_ASSET_ID, None),
                amount: 300,
            }),
        ],
    )
    .unwrap();

    let record = state.get_balance_record(signature_balance_id(alice, BASE_ASSET_ID)).unwrap();
    assert_eq!(record.balance, 400);
    assert_eq!(record.deposit_date, 750);
}

#[test]
fn password_past_timeout_rejects_payee_claim() {
    let params = ChainParams::default();
    let mut state = InMemoryChainState::new(200);
    state.register_asset(base_coin());
    let payor = owner("payor");
    let payee = owner("payee");

    let mut hasher = ripemd::Ripemd160::new();
    use ripemd::Digest;
    hasher.update(b"secret");
    let digest_bytes = hasher.finalize();
    let mut password_hash = [0u8; 20];
    password_hash.copy_from_slice(&digest_bytes);

    let condition = WithdrawConditionWithAsset::new(
        WithdrawCondition::Password { payor, payee, timeout: 100, password_hash },
        BASE_ASSET_ID,
        None,
    );
    let balance_id = condition.balance_id();
    let mut record = ledger_common::records::BalanceRecord::new(condition, 0);
    record.balance = 1000;
    state.store_balance_record(record);

    // now=200 >= timeout=100, so only the payor path is accepted even
    // though the preimage and payee signature are both correct.
    let err = run(
        &mut state,
        &params,
        "withdraw-1",
        &[payee],
        vec![Operation::Withdraw(WithdrawInput {
            balance_id,
            amount: 500,
            claim_preimage: Some(b"secret".to_vec()),
            retractable_override: false,
        })],
    )
    .unwrap_err();

    assert_eq!(err, LedgerError::MissingSignature(payor));
}

#[test]
fn escrow_arbiter_release_splits_between_parties() {
    let params = ChainParams::default();
    let mut state = InMemoryChainState::new(0);
    state.register_asset(base_coin());
    let sender = owner("sender");
    let receiver = owner("receiver");
    let arbiter = owner("arbiter");

    let escrow_condition = WithdrawConditionWithAsset::new(
        WithdrawCondition::Escrow { sender, receiver, escrow: arbiter },
        BASE_ASSET_ID,
        None,
    );
    let escrow_id = escrow_condition.balance_id();
    let mut record = ledger_common::records::BalanceRecord::new(escrow_condition, 0);
    record.balance = 500;
    state.store_balance_record(record);

    run(
        &mut state,
        &params,
        "release-1",
        &[arbiter],
        vec![Operation::ReleaseEscrow(ReleaseEscrowInput {
            escrow_balance_id: escrow_id,
            amount_to_sender: 300,
            amount_to_receiver: 200,
            released_by: ReleasedBy::Arbiter,
        })],
    )
    .unwrap();

    assert_eq!(state.get_balance_record(escrow_id).unwrap().balance, 0);
    assert_eq!(state.get_balance_record(signature_balance_id(sender, BASE_ASSET_ID)).unwrap().balance, 300);
    assert_eq!(state.get_balance_record(signature_balance_id(receiver, BASE_ASSET_ID)).unwrap().balance, 200);
}

#[test]
fn update_vote_cooldown_blocks_then_allows() {
    let params = ChainParams::default();
    let mut state = InMemoryChainState::new(0);
    state.register_asset(base_coin());
    let restricted = owner("restricted-owner");
    let holder = owner("holder");

    let condition = WithdrawConditionWithAsset::new(WithdrawCondition::Signature { owner: holder }, BASE_ASSET_ID, None);
    let balance_id = condition.balance_id();
    let mut record = ledger_common::records::BalanceRecord::new(condition, 0);
    record.balance = params.precision * 10;
    record.restricted_owner = Some(restricted);
    record.last_update = 0;
    state.store_balance_record(record);

    state.set_now(params.vote_update_period - 1);
    let err = run(
        &mut state,
        &params,
        "vote-1",
        &[restricted],
        vec![Operation::UpdateBalanceVote(UpdateBalanceVoteInput {
            balance_id,
            new_slate_id: None,
            new_restricted_owner: Some(restricted),
        })],
    )
    .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidWithdrawCondition { .. }));

    state.set_now(params.vote_update_period);
    run(
        &mut state,
        &params,
        "vote-2",
        &[restricted],
        vec![
            Operation::UpdateBalanceVote(UpdateBalanceVoteInput {
                balance_id,
                new_slate_id: None,
                new_restricted_owner: Some(restricted),
            }),
            Operation::PayFee(PayFeeInput { asset_id: BASE_ASSET_ID, amount: params.vote_update_fee() }),
        ],
    )
    .unwrap();

    let new_id = signature_balance_id(holder, BASE_ASSET_ID);
    let moved = state.get_balance_record(new_id).unwrap();
    assert_eq!(moved.balance, params.precision * 10 - params.vote_update_fee());
}

#[test]
fn burn_below_floor_rejected_at_floor_accepted() {
    use ledger_core::balance::BurnInput;

    let params = ChainParams::default();
    let mut state = InMemoryChainState::new(0);
    state.register_asset(base_coin());

    let err = run(
        &mut state,
        &params,
        "burn-1",
        &[],
        vec![Operation::Burn(BurnInput {
            amount: params.min_burn_fee - 1,
            asset_id: BASE_ASSET_ID,
            account_id: 0,
            message: String::new(),
            signature: vec![],
            tx_id: tx_id("burn-1"),
        })],
    )
    .unwrap_err();
    assert!(matches!(err, LedgerError::BurnBelowFloor { .. }));

    // A burn, like a deposit, only clears the net-movement check (spec
    // §4.4) when an equal withdraw offsets it in the same transaction —
    // here, burning funds just withdrawn from a pre-funded source balance.
    let burner = owner("burner");
    let burner_condition = WithdrawConditionWithAsset::new(WithdrawCondition::Signature { owner: burner }, BASE_ASSET_ID, None);
    let burner_id = burner_condition.balance_id();
    let mut burner_record = ledger_common::records::BalanceRecord::new(burner_condition, 0);
    burner_record.balance = params.min_burn_fee;
    state.store_balance_record(burner_record);

    let supply_before = state.get_asset_record(BASE_ASSET_ID).unwrap().current_share_supply;
    run(
        &mut state,
        &params,
        "burn-2",
        &[burner],
        vec![
            Operation::Withdraw(WithdrawInput {
                balance_id: burner_id,
                amount: params.min_burn_fee,
                claim_preimage: None,
                retractable_override: false,
            }),
            Operation::Burn(BurnInput {
                amount: params.min_burn_fee,
                asset_id: BASE_ASSET_ID,
                account_id: 0,
                message: String::new(),
                signature: vec![],
                tx_id: tx_id("burn-2"),
            }),
        ],
    )
    .unwrap();
    let supply_after = state.get_asset_record(BASE_ASSET_ID).unwrap().current_share_supply;
    assert_eq!(supply_before - supply_after, params.min_burn_fee);
}

#[test]
fn idempotent_slate_definition_is_a_no_op_the_second_time() {
    let params = ChainParams::default();
    let mut state = InMemoryChainState::new(0);
    state.register_asset(base_coin());

    let slate = Slate { delegates: vec![1, 2, 3] };
    run(&mut state, &params, "slate-1", &[], vec![Operation::DefineDelegateSlate(slate.clone())]).unwrap();
    let id = slate.id();
    let first = state.get_delegate_slate(id).unwrap();

    run(&mut state, &params, "slate-2", &[], vec![Operation::DefineDelegateSlate(slate)]).unwrap();
    let second = state.get_delegate_slate(id).unwrap();
    assert_eq!(first, second);
}
