//! Machine-checked invariants for a handful of the balance engine's
//! arithmetic cores (spec §8), gated behind the `kani` feature exactly as
//! the teacher gates its own model-safety proofs. These are narrow,
//! locally-reproduced extracts of the real functions in `ledger-core` —
//! Kani's solver is run over the arithmetic shape, not the full
//! `ChainStateView`-threaded call path.

pub mod deposit_date;
pub mod escrow_split;
pub mod yield_curve;
