pub mod observe;
pub mod prices;
pub mod reader;
pub mod transform;

pub use {
    prices::{CurrencyRates, LockerPricing},
    reader::{BatchReading, NodeReader},
    transform::Transform,
};
