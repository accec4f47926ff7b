//! Resolved configuration of a snapshot run.

use {
    crate::domain::{Address, Chain, TokenKey, registry},
    bigdecimal::BigDecimal,
    std::{
        collections::{BTreeMap, HashMap},
        time::Duration,
    },
    url::Url,
};

pub mod file;

pub use file::{load, parse};

#[derive(Clone, Debug)]
pub struct Config {
    pub chains: BTreeMap<Chain, ChainConfig>,
    pub gauge_remaps: Vec<GaugeRemap>,
    pub fixed_remaps: Vec<FixedRemap>,
    pub cutovers: Vec<Cutover>,
    pub staking: Option<Staking>,
    pub services: Services,
}

impl Config {
    pub fn cutover(&self, chain: &Chain) -> Option<&Cutover> {
        self.cutovers.iter().find(|cutover| &cutover.chain == chain)
    }
}

/// Contracts and rules of one chain.
#[derive(Clone, Debug)]
pub struct ChainConfig {
    pub node_url: Url,
    pub source: Source,
    pub wrapped_native: Option<Address>,
    pub metapool_bases: Vec<Address>,
    pub blacklist: Vec<Address>,
    pub yearn_tokens: Vec<Address>,
    pub cream_tokens: Vec<Address>,
    pub sd_tokens: Vec<Address>,
    pub fx_tokens: Vec<FxToken>,
    /// Address → ledger key overrides for bridged tokens.
    pub transform: HashMap<Address, TokenKey>,
}

impl ChainConfig {
    /// Tokens that are never read because their value is already counted
    /// elsewhere.
    pub fn excluded_tokens(&self) -> Vec<Address> {
        self.blacklist
            .iter()
            .chain(&self.metapool_bases)
            .copied()
            .collect()
    }
}

/// Where the pools of a chain come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Pools listed by the registries the address provider knows about.
    /// A preset mapping skips the address provider lookup.
    Registries {
        address_provider: Address,
        preset: Option<registry::Mapping>,
    },
    /// A fixed set of owners holding a fixed set of tokens.
    SharedOwners {
        owners: Vec<Address>,
        tokens: Vec<Address>,
    },
}

/// A token pegged to a fiat currency other than USD.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FxToken {
    pub address: Address,
    /// ISO currency code, e.g. `EUR`.
    pub currency: String,
}

/// Redirects balance reads of `source` to `target` for pools on one of
/// `chains` or for one of `pools`. Pools list some tokens in their coins
/// while actually holding the matching gauge token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GaugeRemap {
    pub source: Address,
    pub target: Address,
    pub chains: Vec<Chain>,
    pub pools: Vec<Address>,
}

impl GaugeRemap {
    pub fn applies(&self, chain: &Chain, token: Address, pool: Address) -> bool {
        self.source == token && (self.chains.contains(chain) || self.pools.contains(&pool))
    }
}

/// A one-off conversion of a bridged token into its canonical form at a
/// fixed ratio.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedRemap {
    pub chain: Chain,
    pub token: Address,
    pub target: TokenKey,
    pub multiplier: BigDecimal,
    /// Free-form note on when and why the mapping became necessary.
    pub effective_from: Option<String>,
}

/// After `timestamp` the chain holds no value any more.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cutover {
    pub chain: Chain,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    pub reason: String,
}

/// Governance tokens locked in the voting escrow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Staking {
    pub chain: Chain,
    pub escrow: Address,
    pub token: Address,
}

#[derive(Clone, Debug)]
pub struct Services {
    pub locker_prices_url: Url,
    pub exchange_rates_url: Url,
    pub http_timeout: Duration,
}
