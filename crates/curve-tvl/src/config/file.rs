//! TOML representation of the configuration.

use {
    crate::{
        config,
        domain::{Address, Chain, ConfigError, TokenKey, registry},
    },
    anyhow::{Context, Result},
    bigdecimal::BigDecimal,
    serde::Deserialize,
    serde_with::{DisplayFromStr, serde_as},
    std::{
        collections::{BTreeMap, HashMap},
        path::Path,
        time::Duration,
    },
    url::Url,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct Config {
    /// Contract tables keyed by chain name.
    #[serde(default)]
    chain: BTreeMap<Chain, ChainConfig>,

    #[serde(default)]
    gauge_remap: Vec<GaugeRemap>,

    #[serde(default)]
    fixed_remap: Vec<FixedRemap>,

    #[serde(default)]
    cutover: Vec<Cutover>,

    staking: Option<Staking>,

    #[serde(default)]
    services: Services,
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ChainConfig {
    node_url: Url,

    /// Directory of the chain's registries.
    address_provider: Option<Address>,

    /// Skips the address provider lookup if set.
    registries: Option<registry::Mapping>,

    /// Chains without registries sum the balances of fixed owners instead.
    shared_owners: Option<SharedOwners>,

    wrapped_native: Option<Address>,

    #[serde(default)]
    metapool_bases: Vec<Address>,

    #[serde(default)]
    blacklist: Vec<Address>,

    #[serde(default)]
    yearn_tokens: Vec<Address>,

    #[serde(default)]
    cream_tokens: Vec<Address>,

    #[serde(default)]
    sd_tokens: Vec<Address>,

    #[serde(default)]
    fx_tokens: Vec<FxToken>,

    #[serde_as(as = "HashMap<_, DisplayFromStr>")]
    #[serde(default)]
    transform: HashMap<Address, TokenKey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SharedOwners {
    owners: Vec<Address>,
    tokens: Vec<Address>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FxToken {
    address: Address,
    currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct GaugeRemap {
    source: Address,
    target: Address,
    #[serde(default)]
    chains: Vec<Chain>,
    #[serde(default)]
    pools: Vec<Address>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FixedRemap {
    chain: Chain,
    token: Address,
    #[serde_as(as = "DisplayFromStr")]
    target: TokenKey,
    #[serde(with = "number::serialization::plain")]
    multiplier: BigDecimal,
    effective_from: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct Cutover {
    chain: Chain,
    timestamp: u64,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct Staking {
    chain: Chain,
    escrow: Address,
    token: Address,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct Services {
    #[serde(default = "default_locker_prices_url")]
    locker_prices_url: Url,

    #[serde(default = "default_exchange_rates_url")]
    exchange_rates_url: Url,

    #[serde(with = "humantime_serde", default = "default_http_timeout")]
    http_timeout: Duration,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            locker_prices_url: default_locker_prices_url(),
            exchange_rates_url: default_exchange_rates_url(),
            http_timeout: default_http_timeout(),
        }
    }
}

fn default_locker_prices_url() -> Url {
    "https://lockers.stakedao.org/api/lockers".parse().unwrap()
}

fn default_exchange_rates_url() -> Url {
    "https://api.exchangerate.host/convert".parse().unwrap()
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Load the configuration from a TOML file.
///
/// # Panics
///
/// This method panics if the config is invalid or on I/O errors.
pub async fn load(path: &Path) -> config::Config {
    let data = tokio::fs::read_to_string(path)
        .await
        .unwrap_or_else(|e| panic!("I/O error while reading {path:?}: {e:?}"));
    parse(&data).unwrap_or_else(|e| panic!("invalid configuration in {path:?}: {e:?}"))
}

/// Parses and validates a TOML configuration.
pub fn parse(data: &str) -> Result<config::Config> {
    let config: Config = toml::de::from_str(data).context("TOML syntax error")?;

    let chains = config
        .chain
        .into_iter()
        .map(|(chain, table)| {
            let source = match (table.address_provider, table.shared_owners) {
                (_, Some(shared)) => config::Source::SharedOwners {
                    owners: shared.owners,
                    tokens: shared.tokens,
                },
                (Some(address_provider), None) => config::Source::Registries {
                    address_provider,
                    preset: table.registries,
                },
                (None, None) => return Err(ConfigError::MissingSource(chain).into()),
            };
            let table = config::ChainConfig {
                node_url: table.node_url,
                source,
                wrapped_native: table.wrapped_native,
                metapool_bases: table.metapool_bases,
                blacklist: table.blacklist,
                yearn_tokens: table.yearn_tokens,
                cream_tokens: table.cream_tokens,
                sd_tokens: table.sd_tokens,
                fx_tokens: table
                    .fx_tokens
                    .into_iter()
                    .map(|token| config::FxToken {
                        address: token.address,
                        currency: token.currency.to_uppercase(),
                    })
                    .collect(),
                transform: table.transform,
            };
            Ok((chain, table))
        })
        .collect::<Result<_>>()?;

    Ok(config::Config {
        chains,
        gauge_remaps: config
            .gauge_remap
            .into_iter()
            .map(|rule| config::GaugeRemap {
                source: rule.source,
                target: rule.target,
                chains: rule.chains,
                pools: rule.pools,
            })
            .collect(),
        fixed_remaps: config
            .fixed_remap
            .into_iter()
            .map(|remap| config::FixedRemap {
                chain: remap.chain,
                token: remap.token,
                target: remap.target,
                multiplier: remap.multiplier,
                effective_from: remap.effective_from,
            })
            .collect(),
        cutovers: config
            .cutover
            .into_iter()
            .map(|cutover| config::Cutover {
                chain: cutover.chain,
                timestamp: cutover.timestamp,
                reason: cutover.reason,
            })
            .collect(),
        staking: config.staking.map(|staking| config::Staking {
            chain: staking.chain,
            escrow: staking.escrow,
            token: staking.token,
        }),
        services: config::Services {
            locker_prices_url: config.services.locker_prices_url,
            exchange_rates_url: config.services.exchange_rates_url,
            http_timeout: config.services.http_timeout,
        },
    })
}

#[cfg(test)]
mod tests {
    use {super::*, alloy::primitives::address};

    #[test]
    fn parses_example_config() {
        let config = parse(include_str!("../../example.toml")).unwrap();

        let ethereum = &config.chains[&Chain::new("ethereum")];
        assert_eq!(
            ethereum.source,
            config::Source::Registries {
                address_provider: address!("0x0000000022D53366457F9d5E68Ec105046FC4383"),
                preset: None,
            }
        );
        assert!(matches!(
            config.chains[&Chain::new("harmony")].source,
            config::Source::SharedOwners { .. }
        ));
        assert_eq!(
            config.cutover(&Chain::new("harmony")).unwrap().timestamp,
            1655989200
        );
        assert_eq!(
            config.fixed_remaps[0].target.to_string(),
            "bsc:0x7083609fce4d1d8dc0c979aab8c869ea2c873402"
        );
        assert_eq!(config.fixed_remaps[0].multiplier, BigDecimal::from(100_000_000));
        assert_eq!(config.services.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn chains_need_a_pool_source() {
        let err = parse(
            r#"
            [chain.polygon]
            node-url = "http://localhost:8545"
            "#,
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingSource(Chain::new("polygon")))
        );
    }

    #[test]
    fn parses_preset_registries_and_transforms() {
        let config = parse(
            r#"
            [chain.xdai]
            node-url = "http://localhost:8545"
            address-provider = "0x0000000022D53366457F9d5E68Ec105046FC4383"
            fx-tokens = [{ address = "0x0000000000000000000000000000000000000001", currency = "eur" }]

            [chain.xdai.registries]
            stableswap = "0x55E91365697EB8032F98290601847296eC847210"

            [chain.xdai.transform]
            "0x0000000000000000000000000000000000000002" = "usd-coin"

            [services]
            http-timeout = "3s"
            "#,
        )
        .unwrap();

        let xdai = &config.chains[&Chain::new("xdai")];
        let config::Source::Registries { preset, .. } = &xdai.source else {
            panic!("expected registries");
        };
        assert_eq!(
            preset.as_ref().unwrap()[&registry::Kind::Stableswap],
            address!("0x55E91365697EB8032F98290601847296eC847210")
        );
        assert_eq!(xdai.fx_tokens[0].currency, "EUR");
        assert_eq!(
            xdai.transform[&Address::with_last_byte(2)],
            TokenKey::usd()
        );
        assert_eq!(config.services.http_timeout, Duration::from_secs(3));
    }
}
