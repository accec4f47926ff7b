//! Core types shared by the whole snapshot pipeline.

pub mod chain;
pub mod error;
pub mod hallmarks;
pub mod ledger;
pub mod pool;
pub mod registry;
pub mod target;

pub use {
    alloy::primitives::{Address, U256},
    chain::Chain,
    error::{ConfigError, UnwrapError},
    ledger::{Ledger, TokenKey},
    pool::Pool,
    target::Target,
};
