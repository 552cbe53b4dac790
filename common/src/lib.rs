//! Entity records, chain parameters, fixed-point math, and the storage
//! contract shared by `ledger-core` and `ledger-state`.

pub mod error;
pub mod math;
pub mod params;
pub mod records;
pub mod view;

pub use error::{LedgerError, LedgerResult};
pub use params::ChainParams;
pub use view::{AskCandidate, BidCandidate, ChainStateView, OrderKindTag};
