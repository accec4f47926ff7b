//! The snapshot pipeline: registries are resolved, their pools listed, pool
//! balances summed into a ledger and derivative tokens unwrapped.

pub mod coins;
pub mod pools;
pub mod registries;
pub mod snapshot;
pub mod staking;
pub mod summation;
pub mod unwrap;

pub use snapshot::{Adapter, Request};
