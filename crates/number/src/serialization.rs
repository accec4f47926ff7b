//! Plain decimal serialization of amounts.
//!
//! `BigDecimal`'s `Display` may switch to exponent notation for values with
//! large exponents, which downstream consumers of the ledger can't parse.

use {
    bigdecimal::BigDecimal,
    serde::{Deserialize, Deserializer, Serializer, de},
    std::str::FromStr,
};

/// Formats a decimal without exponent and without trailing fractional zeros.
pub fn to_plain_string(value: &BigDecimal) -> String {
    value.normalized().to_plain_string()
}

/// `serde(with = "...")` adapter storing a [`BigDecimal`] as a plain decimal
/// string.
pub mod plain {
    use super::*;

    pub fn serialize<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_plain_string(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BigDecimal::from_str(&s).map_err(de::Error::custom)
    }
}
