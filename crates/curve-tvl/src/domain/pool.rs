use {super::registry::Kind, alloy::primitives::Address};

/// A liquidity pool as listed by a registry. Coin lists are read from the
/// registry, not from the pool, which is why the registry is kept around.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pool {
    pub address: Address,
    pub registry: Address,
    pub kind: Kind,
    /// Position of the pool in the registry's `pool_list`.
    pub index: u64,
}
