//! Transaction evaluation and market-matching core of a delegated-proof-of-
//! stake ledger: the balance/withdraw-condition state machine (§4.2–§4.3)
//! and the continuous double-auction matching engine (§4.6), both driven
//! entirely through the `ledger_common::ChainStateView` trait so this crate
//! never touches concrete storage.

pub mod balance;
pub mod evaluator;
pub mod matching;
pub mod yield_calc;

pub use evaluator::{evaluate_transaction, EvaluationResult, Operation, Transaction, TransactionEvaluator};
pub use matching::run_market_round;
