use {
    alloy::primitives::U256,
    anyhow::{Context, Result, ensure},
    bigdecimal::BigDecimal,
    num::{BigInt, BigUint, bigint::Sign},
    std::str::FromStr,
};

pub fn u256_to_big_uint(input: &U256) -> BigUint {
    BigUint::from_bytes_be(input.to_be_bytes::<32>().as_slice())
}

pub fn u256_to_big_int(input: &U256) -> BigInt {
    BigInt::from_biguint(Sign::Plus, u256_to_big_uint(input))
}

pub fn u256_to_big_decimal(input: &U256) -> BigDecimal {
    BigDecimal::from(u256_to_big_int(input))
}

/// Prices served by HTTP APIs arrive as JSON floats. Going through the
/// shortest round-trip string representation keeps `0.1` as `0.1` instead of
/// the binary expansion of the float.
pub fn f64_to_big_decimal(input: f64) -> Result<BigDecimal> {
    ensure!(input.is_finite(), "non-finite number {input}");
    BigDecimal::from_str(&input.to_string())
        .with_context(|| format!("unable to convert {input} to a decimal"))
}

#[cfg(test)]
mod tests {
    use {super::*, num::Zero};

    #[test]
    fn u256_to_big_uint_() {
        assert_eq!(u256_to_big_uint(&U256::ZERO), BigUint::zero());
        assert_eq!(
            u256_to_big_uint(&U256::MAX),
            BigUint::from_str(
                "115792089237316195423570985008687907853269984665640564039457584007913129639935"
            )
            .unwrap()
        );
    }

    #[test]
    fn u256_to_big_decimal_() {
        assert_eq!(
            u256_to_big_decimal(&U256::from(1337)),
            BigDecimal::from(1337)
        );
    }

    #[test]
    fn floats_keep_their_shortest_representation() {
        assert_eq!(
            f64_to_big_decimal(0.1).unwrap(),
            BigDecimal::from_str("0.1").unwrap()
        );
        assert_eq!(
            f64_to_big_decimal(1.0862).unwrap(),
            BigDecimal::from_str("1.0862").unwrap()
        );
        assert!(f64_to_big_decimal(f64::NAN).is_err());
    }
}
