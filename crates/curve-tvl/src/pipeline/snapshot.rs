//! Per chain snapshots of the protocol's balances.

use {
    super::{coins, pools, registries, staking, summation, unwrap},
    crate::{
        config::{ChainConfig, Config, Source},
        domain::{Address, Chain, ConfigError, Ledger, Pool, hallmarks, registry::Kind},
        infra::{BatchReading, CurrencyRates, LockerPricing, Transform, observe},
    },
    anyhow::{Context, Result},
    futures::future::try_join_all,
    std::{
        collections::{HashMap, HashSet},
        sync::Arc,
        time::Instant,
    },
};

/// The point in time a snapshot is taken at.
#[derive(Clone, Debug, Default)]
pub struct Request {
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Block height to read each chain at.
    pub blocks: HashMap<Chain, u64>,
}

impl Request {
    fn block(&self, chain: &Chain) -> Result<u64, ConfigError> {
        self.blocks
            .get(chain)
            .copied()
            .ok_or_else(|| ConfigError::MissingBlock(chain.clone()))
    }
}

/// Computes balance ledgers of the protocol on every configured chain.
pub struct Adapter {
    config: Config,
    readers: HashMap<Chain, Arc<dyn BatchReading>>,
    lockers: Arc<dyn LockerPricing>,
    rates: Arc<dyn CurrencyRates>,
    registries: registries::RegistryCache,
}

impl Adapter {
    pub fn new(
        config: Config,
        readers: HashMap<Chain, Arc<dyn BatchReading>>,
        lockers: Arc<dyn LockerPricing>,
        rates: Arc<dyn CurrencyRates>,
    ) -> Result<Self> {
        Kind::validate_codes()?;
        if let Some(chain) = config.chains.keys().find(|chain| !readers.contains_key(*chain)) {
            return Err(ConfigError::MissingChain(chain.clone()).into());
        }
        Ok(Self {
            config,
            readers,
            lockers,
            rates,
            registries: registries::RegistryCache::new(),
        })
    }

    /// Chains a snapshot can be taken of.
    pub fn chains(&self) -> impl Iterator<Item = &Chain> {
        self.config.chains.keys()
    }

    /// Chain the governance token is locked on.
    pub fn staking_chain(&self) -> Option<&Chain> {
        self.config.staking.as_ref().map(|staking| &staking.chain)
    }

    pub fn hallmarks(&self) -> &'static [hallmarks::Hallmark] {
        hallmarks::hallmarks()
    }

    /// Total value locked in the protocol's pools on `chain`.
    pub async fn tvl(&self, chain: &Chain, request: &Request) -> Result<Ledger> {
        let block = request.blocks.get(chain).copied();
        observe::snapshot_started(chain, "tvl", block, request.timestamp);
        let start = Instant::now();
        match self.compute_tvl(chain, request).await {
            Ok(ledger) => {
                observe::snapshot_finished(chain, "tvl", &ledger, start.elapsed());
                Ok(ledger)
            }
            Err(err) => {
                observe::snapshot_failed(chain, "tvl", &err);
                Err(err.context(format!("tvl snapshot of {chain}")))
            }
        }
    }

    /// Governance tokens locked for voting, if staking is configured.
    pub async fn staking(&self, request: &Request) -> Result<Option<Ledger>> {
        let Some(staking) = &self.config.staking else {
            return Ok(None);
        };
        let chain = &staking.chain;
        let block = request.block(chain)?;
        observe::snapshot_started(chain, "staking", Some(block), request.timestamp);
        let start = Instant::now();
        let table = self.table(chain)?;
        let transform = Transform::new(chain.clone(), table.transform.clone());
        let ledger = staking::locked(self.reader(chain)?, staking, &transform, block)
            .await
            .with_context(|| format!("staking snapshot of {chain}"))?;
        observe::snapshot_finished(chain, "staking", &ledger, start.elapsed());
        Ok(Some(ledger))
    }

    async fn compute_tvl(&self, chain: &Chain, request: &Request) -> Result<Ledger> {
        let table = self.table(chain)?;
        if let Some(cutover) = self.config.cutover(chain) {
            if request.timestamp > cutover.timestamp {
                observe::cutover_reached(
                    chain,
                    request.timestamp,
                    cutover.timestamp,
                    &cutover.reason,
                );
                return Ok(Ledger::new());
            }
        }

        let block = request.block(chain)?;
        let reader = self.reader(chain)?;
        let transform = Transform::new(chain.clone(), table.transform.clone());
        let ledger = Ledger::new();

        match &table.source {
            Source::SharedOwners { owners, tokens } => {
                summation::sum_shared_owners(&ledger, reader, owners, tokens, block, |token| {
                    transform.key(token)
                })
                .await
                .context("summing shared owner balances")?;
            }
            Source::Registries {
                address_provider,
                preset,
            } => {
                let mapping = registries::resolve(
                    &self.registries,
                    reader,
                    chain,
                    *address_provider,
                    preset.as_ref(),
                    block,
                )
                .await
                .context("resolving registries")?;

                let listed = try_join_all(mapping.iter().map(|(kind, registry)| async move {
                    pools::list(reader, chain, block, *registry, *kind)
                        .await
                        .with_context(|| format!("listing pools of {kind} registry"))
                        .map(|pools| (*kind, pools))
                }))
                .await?;
                let claimed = pools::claim(chain, listed.into_iter().collect());

                let excluded: HashSet<_> = table.excluded_tokens().into_iter().collect();
                try_join_all(claimed.iter().map(|(kind, pools)| {
                    self.sum_pools(
                        &ledger,
                        reader,
                        chain,
                        table,
                        &transform,
                        &excluded,
                        *kind,
                        mapping[kind],
                        pools,
                        block,
                    )
                }))
                .await?;

                let ctx = unwrap::Context {
                    chain,
                    block,
                    ledger: &ledger,
                    transform: &transform,
                    reader,
                    lockers: self.lockers.as_ref(),
                    rates: self.rates.as_ref(),
                };
                unwrap::run(&ctx, table, &self.config.fixed_remaps).await?;
            }
        }
        Ok(ledger)
    }

    #[allow(clippy::too_many_arguments)]
    async fn sum_pools(
        &self,
        ledger: &Ledger,
        reader: &dyn BatchReading,
        chain: &Chain,
        table: &ChainConfig,
        transform: &Transform,
        excluded: &HashSet<Address>,
        kind: Kind,
        registry: Address,
        pools: &[Pool],
        block: u64,
    ) -> Result<()> {
        if pools.is_empty() {
            return Ok(());
        }
        let calls = coins::read(reader, kind, registry, pools, block)
            .await
            .with_context(|| format!("reading coins of {kind} pools"))?;
        let targets = coins::aggregate(
            chain,
            kind,
            &calls,
            table.wrapped_native,
            &self.config.gauge_remaps,
        );
        summation::sum(ledger, reader, targets, block, transform, excluded)
            .await
            .with_context(|| format!("summing balances of {kind} pools"))
    }

    fn table(&self, chain: &Chain) -> Result<&ChainConfig, ConfigError> {
        self.config
            .chains
            .get(chain)
            .ok_or_else(|| ConfigError::MissingChain(chain.clone()))
    }

    fn reader(&self, chain: &Chain) -> Result<&dyn BatchReading, ConfigError> {
        self.readers
            .get(chain)
            .map(|reader| reader.as_ref())
            .ok_or_else(|| ConfigError::MissingChain(chain.clone()))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            config::{Cutover, Services, Staking},
            domain::{TokenKey, target::NATIVE_PLACEHOLDER},
            infra::{
                prices::{MockCurrencyRates, MockLockerPricing},
                reader::{MockBatchReading, MoneyMarketInfo, Output},
            },
        },
        alloy::primitives::{U256, address},
        bigdecimal::BigDecimal,
        maplit::{btreemap, hashmap},
        std::{collections::BTreeMap, time::Duration},
    };

    const WRAPPED: Address = address!("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    const BASE: Address = address!("0x6c3F90f043a72FA612cbac8115EE7e52BDe6E490");
    const USDC: Address = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const CREAM: Address = address!("0x76Eb2FE28b36B3ee97F3Adae0C69606eeDB2A37c");
    const POOL: Address = address!("0xbEbc44782C7dB0a1A60Cb6fe97d0b483032FF1C7");
    const FACTORY_POOL: Address = address!("0xD51a44d3FaE010294C616388b506AcdA1bfAAE46");

    fn services() -> Services {
        Services {
            locker_prices_url: "http://localhost/lockers".parse().unwrap(),
            exchange_rates_url: "http://localhost/convert".parse().unwrap(),
            http_timeout: Duration::from_secs(1),
        }
    }

    fn chain_config(source: Source) -> ChainConfig {
        ChainConfig {
            node_url: "http://localhost:8545".parse().unwrap(),
            source,
            wrapped_native: Some(WRAPPED),
            metapool_bases: vec![BASE],
            blacklist: vec![],
            yearn_tokens: vec![],
            cream_tokens: vec![CREAM],
            sd_tokens: vec![],
            fx_tokens: vec![],
            transform: Default::default(),
        }
    }

    fn config(chains: BTreeMap<Chain, ChainConfig>) -> Config {
        Config {
            chains,
            gauge_remaps: vec![],
            fixed_remaps: vec![],
            cutovers: vec![Cutover {
                chain: Chain::new("harmony"),
                timestamp: 1655989200,
                reason: "bridge exploit".to_owned(),
            }],
            staking: Some(Staking {
                chain: Chain::new("ethereum"),
                escrow: address!("0x5f3b5DfEb7B28CDbD7FAba78963EE202a494e2A2"),
                token: address!("0xD533a949740bb3306d119CC777fa900bA034cd52"),
            }),
            services: services(),
        }
    }

    fn adapter(config: Config, readers: Vec<(Chain, MockBatchReading)>) -> Adapter {
        Adapter::new(
            config,
            readers
                .into_iter()
                .map(|(chain, reader)| (chain, Arc::new(reader) as Arc<dyn BatchReading>))
                .collect(),
            Arc::new(MockLockerPricing::new()),
            Arc::new(MockCurrencyRates::new()),
        )
        .unwrap()
    }

    /// A chain with one stableswap pool holding USDC, the wrapped native
    /// token, a metapool base token and a money market token, and one crypto
    /// factory pool holding USDC.
    fn ethereum_reader() -> MockBatchReading {
        let mut reader = MockBatchReading::new();
        reader.expect_registry_addresses().returning(|_, codes, _| {
            Ok(codes
                .into_iter()
                .map(|code| {
                    let registry = match code {
                        0 => Some(Address::repeat_byte(0x10)),
                        6 => Some(Address::repeat_byte(0x60)),
                        _ => Some(Address::ZERO),
                    };
                    Output::new(code, registry)
                })
                .collect())
        });
        reader.expect_pool_count().returning(|_, _| Ok(Some(1)));
        reader.expect_pool_list().returning(|registry, indices, _| {
            let pool = if registry == Address::repeat_byte(0x10) {
                POOL
            } else {
                FACTORY_POOL
            };
            Ok(indices
                .into_iter()
                .map(|index| Output::new(index, Some(pool)))
                .collect())
        });
        reader.expect_coins().returning(|kind, _, pools, _| {
            let coins = match kind {
                Kind::Stableswap => vec![USDC, WRAPPED, BASE, CREAM, Address::ZERO],
                _ => vec![USDC, Address::repeat_byte(0xff)],
            };
            Ok(pools
                .into_iter()
                .map(|pool| Output::new(pool, Some(coins.clone())))
                .collect())
        });
        reader.expect_coin_counts().returning(|kind, _, pools, _| {
            Ok(pools
                .into_iter()
                .map(|pool| Output::new(pool, kind.has_coin_count().then_some(4)))
                .collect())
        });
        reader
            .expect_balances()
            .withf(|targets, _| !targets.iter().any(|target| target.token == BASE))
            .returning(|targets, _| {
                Ok(targets
                    .into_iter()
                    .map(|target| {
                        let balance = match target.token {
                            token if token == USDC => U256::from(1_000),
                            token if token == CREAM => U256::from(1_000_000),
                            // The unlisted crypto factory coin reverts.
                            token if token == Address::repeat_byte(0xff) => return Output::new(target, None),
                            _ => U256::from(7),
                        };
                        Output::new(target, Some(balance))
                    })
                    .collect())
            });
        reader.expect_money_market_infos().returning(|tokens, _| {
            Ok(tokens
                .into_iter()
                .map(|token| {
                    Output::new(
                        token,
                        Some(MoneyMarketInfo {
                            underlying: USDC,
                            exchange_rate: U256::from(200_000_000_000_000_000u64),
                        }),
                    )
                })
                .collect())
        });
        reader
    }

    #[tokio::test]
    async fn tvl_of_registry_chain() {
        ::observe::tracing::initialize_reentrant("curve_tvl=debug");
        let ethereum = Chain::new("ethereum");
        let adapter = adapter(
            config(btreemap! {
                ethereum.clone() => chain_config(Source::Registries {
                    address_provider: Address::repeat_byte(0xaa),
                    preset: None,
                }),
            }),
            vec![(ethereum.clone(), ethereum_reader())],
        );
        let request = Request {
            timestamp: 1700000000,
            blocks: hashmap! { ethereum.clone() => 18_000_000 },
        };

        let ledger = adapter.tvl(&ethereum, &request).await.unwrap();

        let key = |token| TokenKey::on_chain(&ethereum, token);
        assert_eq!(
            ledger.into_balances(),
            btreemap! {
                // Both pools hold USDC plus what the money market token unwraps to.
                key(USDC) => BigDecimal::from(1_000 + 1_000 + 200_000),
                key(WRAPPED) => BigDecimal::from(7),
                key(Address::ZERO) => BigDecimal::from(7),
            }
        );
    }

    #[tokio::test]
    async fn pools_and_targets_are_counted_once() {
        let ethereum = Chain::new("ethereum");
        let mut reader = MockBatchReading::new();
        // The main registry and the stable factory both list the same pool.
        reader.expect_registry_addresses().returning(|_, codes, _| {
            Ok(codes
                .into_iter()
                .map(|code| {
                    let registry = match code {
                        0 => Address::repeat_byte(0x10),
                        3 => Address::repeat_byte(0x30),
                        _ => Address::ZERO,
                    };
                    Output::new(code, Some(registry))
                })
                .collect())
        });
        reader.expect_pool_count().returning(|_, _| Ok(Some(1)));
        reader.expect_pool_list().returning(|_, indices, _| {
            Ok(indices
                .into_iter()
                .map(|index| Output::new(index, Some(POOL)))
                .collect())
        });
        reader.expect_coins().times(1).returning(|_, _, pools, _| {
            Ok(pools
                .into_iter()
                .map(|pool| Output::new(pool, Some(vec![NATIVE_PLACEHOLDER, WRAPPED, USDC])))
                .collect())
        });
        reader
            .expect_coin_counts()
            .times(1)
            .returning(|_, _, pools, _| {
                Ok(pools
                    .into_iter()
                    .map(|pool| Output::new(pool, Some(3)))
                    .collect())
            });
        reader.expect_balances().times(1).returning(|targets, _| {
            assert_eq!(targets.len(), 3);
            Ok(targets
                .into_iter()
                .map(|target| {
                    let balance = if target.token == WRAPPED { 5 } else { 1_000 };
                    Output::new(target, Some(U256::from(balance)))
                })
                .collect())
        });
        let adapter = adapter(
            config(btreemap! {
                ethereum.clone() => chain_config(Source::Registries {
                    address_provider: Address::repeat_byte(0xaa),
                    preset: None,
                }),
            }),
            vec![(ethereum.clone(), reader)],
        );
        let request = Request {
            timestamp: 1700000000,
            blocks: hashmap! { ethereum.clone() => 18_000_000 },
        };

        let ledger = adapter.tvl(&ethereum, &request).await.unwrap();

        let key = |token| TokenKey::on_chain(&ethereum, token);
        assert_eq!(
            ledger.into_balances(),
            btreemap! {
                key(USDC) => BigDecimal::from(1_000),
                key(WRAPPED) => BigDecimal::from(5),
                key(Address::ZERO) => BigDecimal::from(1_000),
            }
        );
    }

    #[tokio::test]
    async fn shared_owner_chains_skip_registries() {
        let kava = Chain::new("kava");
        let token = address!("0x7A0e3b70b1dB0D6CA63Cac240895b2D21444A7b9");
        let owners = vec![
            address!("0x765277EebeCA2e31912C9946eAe1021199B39C61"),
            address!("0xB44a9B6905aF7c801311e8F4E76932ee959c663C"),
        ];
        let mut reader = MockBatchReading::new();
        reader.expect_balances().times(1).returning(|targets, _| {
            assert_eq!(targets.len(), 2);
            Ok(targets
                .into_iter()
                .map(|target| Output::new(target, Some(U256::from(5))))
                .collect())
        });
        let adapter = adapter(
            config(btreemap! {
                kava.clone() => chain_config(Source::SharedOwners { owners, tokens: vec![token] }),
            }),
            vec![(kava.clone(), reader)],
        );
        let request = Request {
            timestamp: 1700000000,
            blocks: hashmap! { kava.clone() => 1 },
        };

        let ledger = adapter.tvl(&kava, &request).await.unwrap();
        assert_eq!(
            ledger.into_balances(),
            btreemap! { TokenKey::on_chain(&kava, token) => BigDecimal::from(10) }
        );
    }

    #[tokio::test]
    async fn chains_past_their_cutover_are_empty() {
        let harmony = Chain::new("harmony");
        let adapter = adapter(
            config(btreemap! {
                harmony.clone() => chain_config(Source::SharedOwners {
                    owners: vec![address!("0xef977d2f931c1978db5f6747666fa1eacb0d0339")],
                    tokens: vec![address!("0xC5cfaDA84E902aD92DD40194f0883ad49639b023")],
                }),
            }),
            vec![(harmony.clone(), MockBatchReading::new())],
        );

        // No block is needed once the cutover has passed.
        let request = Request {
            timestamp: 1655989201,
            blocks: Default::default(),
        };
        let ledger = adapter.tvl(&harmony, &request).await.unwrap();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn missing_blocks_fail() {
        let ethereum = Chain::new("ethereum");
        let adapter = adapter(
            config(btreemap! {
                ethereum.clone() => chain_config(Source::Registries {
                    address_provider: Address::repeat_byte(0xaa),
                    preset: None,
                }),
            }),
            vec![(ethereum.clone(), MockBatchReading::new())],
        );

        let err = adapter.tvl(&ethereum, &Request::default()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingBlock(ethereum))
        );
    }

    #[tokio::test]
    async fn staking_reads_escrow_balance() {
        let ethereum = Chain::new("ethereum");
        let mut reader = MockBatchReading::new();
        reader.expect_balances().returning(|targets, _| {
            Ok(targets
                .into_iter()
                .map(|target| Output::new(target, Some(U256::from(42))))
                .collect())
        });
        let adapter = adapter(
            config(btreemap! {
                ethereum.clone() => chain_config(Source::Registries {
                    address_provider: Address::repeat_byte(0xaa),
                    preset: None,
                }),
            }),
            vec![(ethereum.clone(), reader)],
        );
        let request = Request {
            timestamp: 1700000000,
            blocks: hashmap! { ethereum.clone() => 1 },
        };

        let ledger = adapter.staking(&request).await.unwrap().unwrap();
        assert_eq!(
            ledger.into_balances(),
            btreemap! {
                "ethereum:0xd533a949740bb3306d119cc777fa900ba034cd52".parse::<TokenKey>().unwrap()
                    => BigDecimal::from(42),
            }
        );
    }

    #[test]
    fn readers_are_required_for_every_chain() {
        let result = Adapter::new(
            config(btreemap! {
                Chain::new("celo") => chain_config(Source::Registries {
                    address_provider: Address::repeat_byte(0xaa),
                    preset: None,
                }),
            }),
            HashMap::new(),
            Arc::new(MockLockerPricing::new()),
            Arc::new(MockCurrencyRates::new()),
        );
        assert!(matches!(
            result.err().and_then(|err| err.downcast::<ConfigError>().ok()),
            Some(ConfigError::MissingChain(_))
        ));
    }
}
