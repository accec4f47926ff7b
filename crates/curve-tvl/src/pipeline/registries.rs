//! Discovery of the registries deployed on a chain.

use {
    crate::{
        domain::{
            Address,
            Chain,
            registry::{Kind, Mapping},
        },
        infra::{BatchReading, observe, reader::Output},
    },
    anyhow::Result,
    dashmap::DashMap,
};

/// Registry mappings resolved so far, per chain.
///
/// Entries are populated on first use and never invalidated. A mapping is
/// only correct for blocks between the deployment of the registries it
/// lists and their replacement, so reusing it across a wide block range can
/// miss redeployed registries.
#[derive(Debug, Default)]
pub struct RegistryCache(DashMap<Chain, Entry>);

#[derive(Debug, Clone)]
struct Entry {
    mapping: Mapping,
    block: u64,
}

impl RegistryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, chain: &Chain, block: u64) -> Option<Mapping> {
        let entry = self.0.get(chain)?;
        if entry.block != block {
            tracing::warn!(
                %chain,
                resolved_at = entry.block,
                block,
                "reusing registries resolved at another block"
            );
        }
        Some(entry.mapping.clone())
    }

    fn insert(&self, chain: &Chain, mapping: Mapping, block: u64) {
        self.0.insert(chain.clone(), Entry { mapping, block });
    }
}

/// Returns the registry address of every kind deployed on `chain`.
///
/// A preset mapping is returned as is. Otherwise the address provider is
/// asked for every known registry id once per process.
pub async fn resolve(
    cache: &RegistryCache,
    reader: &dyn BatchReading,
    chain: &Chain,
    address_provider: Address,
    preset: Option<&Mapping>,
    block: u64,
) -> Result<Mapping> {
    if let Some(preset) = preset {
        return Ok(preset.clone());
    }
    if let Some(mapping) = cache.get(chain, block) {
        observe::reused_registries(chain);
        return Ok(mapping);
    }

    let outputs = reader
        .registry_addresses(address_provider, Kind::codes(), block)
        .await?;
    let mut mapping = Mapping::new();
    for Output { input: code, output } in outputs {
        let kind = Kind::from_code(code)?;
        match output {
            Some(registry) if !registry.is_zero() => {
                mapping.insert(kind, registry);
            }
            _ => observe::dropped_registry(chain, code),
        }
    }

    observe::resolved_registries(chain, &mapping);
    cache.insert(chain, mapping.clone(), block);
    Ok(mapping)
}
