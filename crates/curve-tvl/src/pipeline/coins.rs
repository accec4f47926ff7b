//! Turns the coin lists of pools into the balances that need to be read.

use {
    crate::{
        config::GaugeRemap,
        domain::{Address, Chain, Pool, Target, registry::Kind},
        infra::BatchReading,
    },
    anyhow::Result,
    std::collections::HashMap,
};

/// The coins a registry reports for one pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoinCall {
    pub pool: Address,
    /// Coin slots including trailing filler.
    pub coins: Vec<Address>,
    /// Number of coins the pool actually has. Always `None` for registries
    /// without coin counts.
    pub count: Option<u64>,
}

/// Reads the coin lists and coin counts of all pools of one registry.
/// Pools whose coin list can't be read are skipped.
pub async fn read(
    reader: &dyn BatchReading,
    kind: Kind,
    registry: Address,
    pools: &[Pool],
    block: u64,
) -> Result<Vec<CoinCall>> {
    let addresses: Vec<_> = pools.iter().map(|pool| pool.address).collect();
    let (coins, counts) = futures::try_join!(
        reader.coins(kind, registry, addresses.clone(), block),
        reader.coin_counts(kind, registry, addresses, block),
    )?;

    let counts: HashMap<_, _> = counts
        .into_iter()
        .filter_map(|count| Some((count.input, count.output?)))
        .collect();
    Ok(coins
        .into_iter()
        .filter_map(|coins| {
            Some(CoinCall {
                pool: coins.input,
                count: counts.get(&coins.input).copied(),
                coins: coins.output?,
            })
        })
        .collect())
}

/// Builds the balance targets of one registry's pools.
///
/// Registries with coin counts only contribute the first `n` coins of a pool
/// and nothing for pools without a count. Coins equal to the wrapped native
/// token are counted twice, once as the native asset and once as the wrapped
/// token, since such pools hold both.
pub fn aggregate(
    chain: &Chain,
    kind: Kind,
    calls: &[CoinCall],
    wrapped_native: Option<Address>,
    gauge_remaps: &[GaugeRemap],
) -> Vec<Target> {
    let mut targets = Vec::new();
    for call in calls {
        let owner = call.pool;
        let coins: &[Address] = if kind.has_coin_count() {
            let n = call
                .count
                .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
                .unwrap_or_default();
            &call.coins[..n.min(call.coins.len())]
        } else {
            &call.coins
        };

        // Empty coin slots are reported as the zero address.
        for &coin in coins.iter().filter(|coin| !coin.is_zero()) {
            if Some(coin) == wrapped_native {
                targets.push(Target::native(owner));
            }
            let token = gauge_remaps
                .iter()
                .find(|rule| rule.applies(chain, coin, owner))
                .map(|rule| rule.target)
                .unwrap_or(coin);
            targets.push(Target::new(token, owner));
        }
    }
    targets
}
