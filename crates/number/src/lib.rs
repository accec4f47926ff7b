//! Arbitrary precision helpers for token amounts.
//!
//! On-chain amounts come in as [`alloy::primitives::U256`] while every
//! conversion that involves a rate or a price is carried out on
//! [`bigdecimal::BigDecimal`] so intermediate products can't overflow.

pub mod conversions;
pub mod fixed_point;
pub mod serialization;
