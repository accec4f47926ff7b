//! Registry kinds and the per-chain mapping of kinds to registry contracts.

use {
    super::ConfigError,
    alloy::primitives::Address,
    serde::{Deserialize, Serialize},
    std::collections::{BTreeMap, HashSet},
    strum::IntoEnumIterator,
};

/// The schema variant a registry's pools follow. Every kind is registered
/// in the address provider under a fixed numeric id.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Kind {
    /// The main registry of plain and lending stableswap pools.
    Stableswap,
    /// Permissionless stableswap pools deployed by the factory.
    StableFactory,
    /// The registry of two- and three-coin crypto pools.
    Crypto,
    /// Permissionless two-coin crypto pools.
    CryptoFactory,
}

impl Kind {
    /// Id of the registry kind in the address provider.
    pub const fn code(self) -> u64 {
        match self {
            Self::Stableswap => 0,
            Self::StableFactory => 3,
            Self::Crypto => 5,
            Self::CryptoFactory => 6,
        }
    }

    pub fn from_code(code: u64) -> Result<Self, ConfigError> {
        Self::iter()
            .find(|kind| kind.code() == code)
            .ok_or(ConfigError::UnknownRegistryKind(code))
    }

    /// All ids the address provider is queried for.
    pub fn codes() -> Vec<u64> {
        Self::iter().map(Self::code).collect()
    }

    /// Whether the registry exposes `get_n_coins`. Crypto factories don't
    /// and their coin list never contains filler slots.
    pub fn has_coin_count(self) -> bool {
        !matches!(self, Self::CryptoFactory)
    }

    /// Checks that ids and kinds map onto each other one to one. Run once at
    /// startup.
    pub fn validate_codes() -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for kind in Self::iter() {
            if !seen.insert(kind.code()) {
                return Err(ConfigError::DuplicateRegistryCode(kind.code()));
            }
            if Self::from_code(kind.code())? != kind {
                return Err(ConfigError::DuplicateRegistryCode(kind.code()));
            }
        }
        Ok(())
    }
}

/// Registry contract address per kind for one chain. Kinds that are not
/// deployed on a chain are absent.
pub type Mapping = BTreeMap<Kind, Address>;
