use {
    super::Chain,
    alloy::primitives::Address,
    thiserror::Error,
};

/// Mismatches between the code and its configuration. These are never
/// transient and abort a snapshot immediately.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown registry id: {0}")]
    UnknownRegistryKind(u64),
    #[error("registry id {0} is assigned to more than one registry kind")]
    DuplicateRegistryCode(u64),
    #[error("no contract table configured for chain {0}")]
    MissingChain(Chain),
    #[error("no block height supplied for chain {0}")]
    MissingBlock(Chain),
    #[error("chain {0} has neither an address provider nor shared owners configured")]
    MissingSource(Chain),
}

/// Failures of an unwrap pass that would otherwise make the ledger silently
/// under-report value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnwrapError {
    #[error("locker price list has no entry for held token {0}")]
    MissingLockerPrice(Address),
    #[error("no USD conversion rate for currency {0}")]
    MissingRate(String),
    #[error("vault {0} did not report its underlying token or share price")]
    MissingVaultInfo(Address),
    #[error("money market token {0} did not report its underlying token or exchange rate")]
    MissingExchangeRate(Address),
}
