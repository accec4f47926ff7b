use {
    crate::{
        domain::{Address, Chain, Pool, registry::Kind},
        infra::{BatchReading, observe},
    },
    anyhow::{Result, ensure},
    std::collections::{BTreeMap, HashMap, HashSet, hash_map::Entry},
};

/// Registries hold a few thousand pools at most. A larger count can't be
/// trusted.
const MAX_POOLS: u64 = 100_000;

/// Number of `pool_list` indices requested per fan-out.
const CHUNK: u64 = 1_000;

/// Lists the pools of a registry in registry order. Slots that don't
/// resolve to a pool and repeated entries are dropped.
pub async fn list(
    reader: &dyn BatchReading,
    chain: &Chain,
    block: u64,
    registry: Address,
    kind: Kind,
) -> Result<Vec<Pool>> {
    let Some(count) = reader.pool_count(registry, block).await? else {
        observe::listed_pools(chain, kind, 0);
        return Ok(Vec::new());
    };

    ensure!(
        count <= MAX_POOLS,
        "registry {registry} reports {count} pools, more than {MAX_POOLS}"
    );
    let mut outputs = Vec::new();
    let mut start = 0;
    while start < count {
        let end = count.min(start + CHUNK);
        outputs.extend(
            reader
                .pool_list(registry, (start..end).collect(), block)
                .await?,
        );
        start = end;
    }
    let mut seen = HashSet::new();
    let pools: Vec<_> = outputs
        .into_iter()
        .filter_map(|output| match output.output {
            Some(address) if !address.is_zero() => Some(Pool {
                address,
                registry,
                kind,
                index: output.input,
            }),
            _ => {
                observe::dropped_pool(chain, kind, output.input);
                None
            }
        })
        .filter(|pool| seen.insert(pool.address))
        .collect();

    observe::listed_pools(chain, kind, pools.len());
    Ok(pools)
}

/// Drops pools that a registry earlier in kind order already lists, so
/// every pool is summed exactly once per snapshot.
pub fn claim(chain: &Chain, listed: BTreeMap<Kind, Vec<Pool>>) -> BTreeMap<Kind, Vec<Pool>> {
    let mut owners = HashMap::new();
    listed
        .into_iter()
        .map(|(kind, pools)| {
            let pools = pools
                .into_iter()
                .filter(|pool| match owners.entry(pool.address) {
                    Entry::Occupied(owner) => {
                        observe::duplicate_pool(chain, kind, pool.address, *owner.get());
                        false
                    }
                    Entry::Vacant(owner) => {
                        owner.insert(kind);
                        true
                    }
                })
                .collect();
            (kind, pools)
        })
        .collect()
}
