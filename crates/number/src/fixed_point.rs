//! Fixed-point scaling of token amounts.

use {
    bigdecimal::{BigDecimal, RoundingMode},
    num::BigInt,
};

/// Scale of rates quoted as 18 decimal fixed-point numbers (`1e18`).
pub const WAD_DECIMALS: u32 = 18;

/// Returns `10^decimals` as a decimal.
pub fn pow10(decimals: u32) -> BigDecimal {
    BigDecimal::from(BigInt::from(10u8).pow(decimals))
}

/// Rounds to an integer, ties away from zero.
pub fn round_half_up(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(0, RoundingMode::HalfUp)
}

/// Computes `amount * rate / 10^decimals` rounded to a whole number of
/// smallest units.
pub fn mul_div_pow10(amount: &BigDecimal, rate: &BigDecimal, decimals: u32) -> BigDecimal {
    round_half_up(&(amount * rate / pow10(decimals)))
}

/// Computes `amount * price / 10^decimals` without rounding. Used when the
/// result is denominated in whole units of a reference currency.
pub fn value_in_units(amount: &BigDecimal, price: &BigDecimal, decimals: u32) -> BigDecimal {
    amount * price / pow10(decimals)
}
