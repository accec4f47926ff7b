//! The balance ledger a snapshot produces.

use {
    super::Chain,
    alloy::primitives::Address,
    bigdecimal::{BigDecimal, Zero},
    dashmap::DashMap,
    serde::{Serialize, Serializer, ser::SerializeMap},
    std::{collections::BTreeMap, fmt, str::FromStr},
};

/// Canonical identity of a token in the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKey {
    /// A token contract on a specific chain, rendered as `chain:0xaddress`.
    Chain { chain: Chain, address: Address },
    /// A chain-agnostic identifier such as `usd-coin`.
    Synthetic(String),
}

impl TokenKey {
    pub const USD: &'static str = "usd-coin";

    pub fn on_chain(chain: &Chain, address: Address) -> Self {
        Self::Chain {
            chain: chain.clone(),
            address,
        }
    }

    pub fn usd() -> Self {
        Self::Synthetic(Self::USD.to_owned())
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // `{:#x}` renders addresses lowercase, not checksummed.
            Self::Chain { chain, address } => write!(f, "{chain}:{address:#x}"),
            Self::Synthetic(id) => f.write_str(id),
        }
    }
}

impl FromStr for TokenKey {
    type Err = anyhow::Error;

    /// Parses `chain:0xaddress` into a chain key and anything without a
    /// colon into a synthetic key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((chain, address)) => Ok(Self::Chain {
                chain: Chain::new(chain),
                address: address.parse()?,
            }),
            None => Ok(Self::Synthetic(s.to_owned())),
        }
    }
}

impl Serialize for TokenKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Token key to amount. Shared by all registry branches of a snapshot, so
/// every mutation is atomic per key.
///
/// Amounts under chain keys are integral smallest units. Amounts under
/// synthetic keys are whole units of the synthetic asset and may carry
/// fractions.
#[derive(Debug, Default)]
pub struct Ledger(DashMap<TokenKey, BigDecimal>);

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the balance of `key`. Zero amounts never create a
    /// key.
    pub fn add(&self, key: TokenKey, amount: BigDecimal) {
        if amount.is_zero() {
            return;
        }
        *self.0.entry(key).or_default() += amount;
    }

    /// Removes `key` and returns what it held.
    pub fn remove(&self, key: &TokenKey) -> Option<BigDecimal> {
        self.0.remove(key).map(|(_, amount)| amount)
    }

    pub fn get(&self, key: &TokenKey) -> Option<BigDecimal> {
        self.0.get(key).map(|amount| amount.clone())
    }

    pub fn contains(&self, key: &TokenKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of the current contents, ordered by key.
    pub fn balances(&self) -> BTreeMap<TokenKey, BigDecimal> {
        self.0
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn into_balances(self) -> BTreeMap<TokenKey, BigDecimal> {
        self.0.into_iter().collect()
    }
}

impl FromIterator<(TokenKey, BigDecimal)> for Ledger {
    fn from_iter<T: IntoIterator<Item = (TokenKey, BigDecimal)>>(iter: T) -> Self {
        let ledger = Self::new();
        for (key, amount) in iter {
            ledger.add(key, amount);
        }
        ledger
    }
}

impl Serialize for Ledger {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let balances = self.balances();
        let mut map = serializer.serialize_map(Some(balances.len()))?;
        for (key, amount) in &balances {
            map.serialize_entry(key, &number::serialization::to_plain_string(amount))?;
        }
        map.end()
    }
}
