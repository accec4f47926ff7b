//! Batched contract reads against a chain node at a fixed block height.

use {
    crate::domain::{Target, registry::Kind},
    alloy::{
        eips::BlockId,
        primitives::{Address, U256},
        providers::Provider,
        sol,
    },
    anyhow::{Context, Result},
    ethrpc::{AlloyProvider, errors::ignore_non_node_error},
    futures::{StreamExt, TryStreamExt, stream},
    std::{
        future::{Future, IntoFuture},
        num::NonZeroUsize,
    },
};

sol! {
    #[sol(rpc)]
    interface AddressProvider {
        function get_id_info(uint256 id) external view returns (address addr, bool is_active, uint256 version, uint256 last_modified, string description);
    }

    #[sol(rpc)]
    interface Registry {
        function pool_count() external view returns (uint256);
        function pool_list(uint256 i) external view returns (address);
    }

    #[sol(rpc)]
    interface StableswapRegistry {
        function get_coins(address pool) external view returns (address[8]);
        function get_n_coins(address pool) external view returns (uint256[2]);
    }

    #[sol(rpc)]
    interface StableFactory {
        function get_coins(address pool) external view returns (address[4]);
        function get_n_coins(address pool) external view returns (uint256);
    }

    #[sol(rpc)]
    interface CryptoRegistry {
        function get_coins(address pool) external view returns (address[8]);
        function get_n_coins(address pool) external view returns (uint256);
    }

    #[sol(rpc)]
    interface CryptoFactory {
        function get_coins(address pool) external view returns (address[2]);
    }

    #[sol(rpc)]
    interface ERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
    }

    #[sol(rpc)]
    interface YearnVault {
        function token() external view returns (address);
        function pricePerShare() external view returns (uint256);
        function decimals() external view returns (uint8);
    }

    #[sol(rpc)]
    interface CToken {
        function exchangeRateStored() external view returns (uint256);
        function underlying() external view returns (address);
    }
}

/// One result of a batched read. Calls that reverted carry no output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output<I, O> {
    pub input: I,
    pub output: Option<O>,
}

impl<I, O> Output<I, O> {
    pub fn new(input: I, output: Option<O>) -> Self {
        Self { input, output }
    }
}

/// What an interest-bearing vault reports about its shares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VaultInfo {
    pub underlying: Address,
    pub price_per_share: U256,
    pub decimals: u8,
}

/// What a money market receipt token reports about its underlying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoneyMarketInfo {
    pub underlying: Address,
    /// Underlying per receipt token scaled by `1e18`.
    pub exchange_rate: U256,
}

/// Typed batch reads the snapshot pipeline needs from one chain.
///
/// Every method returns one [`Output`] per input in input order. Reverting
/// calls produce `None` outputs, failing nodes produce errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait BatchReading: Send + Sync {
    /// Registry addresses the address provider lists under `codes`.
    async fn registry_addresses(
        &self,
        address_provider: Address,
        codes: Vec<u64>,
        block: u64,
    ) -> Result<Vec<Output<u64, Address>>>;

    /// Number of pools a registry lists.
    async fn pool_count(&self, registry: Address, block: u64) -> Result<Option<u64>>;

    /// Pool addresses a registry lists at `indices`.
    async fn pool_list(
        &self,
        registry: Address,
        indices: Vec<u64>,
        block: u64,
    ) -> Result<Vec<Output<u64, Address>>>;

    /// Coin lists of `pools` as reported by a registry of `kind`, including
    /// filler slots.
    async fn coins(
        &self,
        kind: Kind,
        registry: Address,
        pools: Vec<Address>,
        block: u64,
    ) -> Result<Vec<Output<Address, Vec<Address>>>>;

    /// Number of coins of `pools`. Registries of a kind without coin counts
    /// yield no outputs.
    async fn coin_counts(
        &self,
        kind: Kind,
        registry: Address,
        pools: Vec<Address>,
        block: u64,
    ) -> Result<Vec<Output<Address, u64>>>;

    /// Balances of the targets. Native targets read the owner's native
    /// balance.
    async fn balances(&self, targets: Vec<Target>, block: u64) -> Result<Vec<Output<Target, U256>>>;

    async fn decimals(&self, tokens: Vec<Address>, block: u64) -> Result<Vec<Output<Address, u8>>>;

    async fn vault_infos(
        &self,
        vaults: Vec<Address>,
        block: u64,
    ) -> Result<Vec<Output<Address, VaultInfo>>>;

    async fn money_market_infos(
        &self,
        tokens: Vec<Address>,
        block: u64,
    ) -> Result<Vec<Output<Address, MoneyMarketInfo>>>;
}

/// [`BatchReading`] implementation issuing individual `eth_call`s against a
/// node with a bounded number of requests in flight.
pub struct NodeReader {
    provider: AlloyProvider,
    concurrency: NonZeroUsize,
}

impl NodeReader {
    pub fn new(provider: AlloyProvider, config: &ethrpc::Config) -> Self {
        Self {
            provider,
            concurrency: config.max_concurrent_requests,
        }
    }

    async fn fan_out<I, O, F, Fut>(&self, inputs: Vec<I>, call: F) -> Result<Vec<Output<I, O>>>
    where
        I: Clone + Send,
        O: Send,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<Option<O>>> + Send,
    {
        stream::iter(inputs)
            .map(|input| {
                let read = call(input.clone());
                async move { Ok(Output::new(input, read.await?)) }
            })
            .buffered(self.concurrency.get())
            .try_collect()
            .await
    }
}

fn to_u64(value: U256) -> Option<u64> {
    u64::try_from(value).ok()
}

#[async_trait::async_trait]
impl BatchReading for NodeReader {
    async fn registry_addresses(
        &self,
        address_provider: Address,
        codes: Vec<u64>,
        block: u64,
    ) -> Result<Vec<Output<u64, Address>>> {
        let directory = AddressProvider::new(address_provider, self.provider.clone());
        self.fan_out(codes, |code| {
            let call = directory.get_id_info(U256::from(code));
            async move {
                let info = call.block(BlockId::number(block)).call().await;
                ignore_non_node_error(info.map(|info| info.addr))
            }
        })
        .await
        .context("get_id_info")
    }

    async fn pool_count(&self, registry: Address, block: u64) -> Result<Option<u64>> {
        let count = Registry::new(registry, self.provider.clone())
            .pool_count()
            .block(BlockId::number(block))
            .call()
            .await;
        Ok(ignore_non_node_error(count)
            .context("pool_count")?
            .and_then(to_u64))
    }

    async fn pool_list(
        &self,
        registry: Address,
        indices: Vec<u64>,
        block: u64,
    ) -> Result<Vec<Output<u64, Address>>> {
        let registry = Registry::new(registry, self.provider.clone());
        self.fan_out(indices, |index| {
            let call = registry.pool_list(U256::from(index));
            async move { ignore_non_node_error(call.block(BlockId::number(block)).call().await) }
        })
        .await
        .context("pool_list")
    }

    async fn coins(
        &self,
        kind: Kind,
        registry: Address,
        pools: Vec<Address>,
        block: u64,
    ) -> Result<Vec<Output<Address, Vec<Address>>>> {
        let block = BlockId::number(block);
        let provider = self.provider.clone();
        self.fan_out(pools, |pool| {
            let provider = provider.clone();
            async move {
                let coins = match kind {
                    Kind::Stableswap => StableswapRegistry::new(registry, provider)
                        .get_coins(pool)
                        .block(block)
                        .call()
                        .await
                        .map(Vec::from),
                    Kind::StableFactory => StableFactory::new(registry, provider)
                        .get_coins(pool)
                        .block(block)
                        .call()
                        .await
                        .map(Vec::from),
                    Kind::Crypto => CryptoRegistry::new(registry, provider)
                        .get_coins(pool)
                        .block(block)
                        .call()
                        .await
                        .map(Vec::from),
                    Kind::CryptoFactory => CryptoFactory::new(registry, provider)
                        .get_coins(pool)
                        .block(block)
                        .call()
                        .await
                        .map(Vec::from),
                };
                ignore_non_node_error(coins)
            }
        })
        .await
        .with_context(|| format!("get_coins on {kind} registry {registry}"))
    }

    async fn coin_counts(
        &self,
        kind: Kind,
        registry: Address,
        pools: Vec<Address>,
        block: u64,
    ) -> Result<Vec<Output<Address, u64>>> {
        if !kind.has_coin_count() {
            return Ok(pools
                .into_iter()
                .map(|pool| Output::new(pool, None))
                .collect());
        }
        let block = BlockId::number(block);
        let provider = self.provider.clone();
        self.fan_out(pools, |pool| {
            let provider = provider.clone();
            async move {
                let count = match kind {
                    // The main registry returns `[coins, underlying coins]`.
                    Kind::Stableswap => StableswapRegistry::new(registry, provider)
                        .get_n_coins(pool)
                        .block(block)
                        .call()
                        .await
                        .map(|counts| counts[0]),
                    Kind::StableFactory => StableFactory::new(registry, provider)
                        .get_n_coins(pool)
                        .block(block)
                        .call()
                        .await,
                    Kind::Crypto => CryptoRegistry::new(registry, provider)
                        .get_n_coins(pool)
                        .block(block)
                        .call()
                        .await,
                    Kind::CryptoFactory => return Ok(None),
                };
                Ok(ignore_non_node_error(count)?.and_then(to_u64))
            }
        })
        .await
        .with_context(|| format!("get_n_coins on {kind} registry {registry}"))
    }

    async fn balances(&self, targets: Vec<Target>, block: u64) -> Result<Vec<Output<Target, U256>>> {
        let block = BlockId::number(block);
        let provider = self.provider.clone();
        self.fan_out(targets, |target| {
            let provider = provider.clone();
            async move {
                if target.is_native() {
                    let balance = provider
                        .get_balance(target.owner)
                        .block_id(block)
                        .await
                        .with_context(|| format!("native balance of {}", target.owner))?;
                    return Ok(Some(balance));
                }
                let balance = ERC20::new(target.token, provider)
                    .balanceOf(target.owner)
                    .block(block)
                    .call()
                    .await;
                ignore_non_node_error(balance)
            }
        })
        .await
        .context("balanceOf")
    }

    async fn decimals(&self, tokens: Vec<Address>, block: u64) -> Result<Vec<Output<Address, u8>>> {
        let block = BlockId::number(block);
        let provider = self.provider.clone();
        self.fan_out(tokens, |token| {
            let provider = provider.clone();
            async move {
                let decimals = ERC20::new(token, provider)
                    .decimals()
                    .block(block)
                    .call()
                    .await;
                ignore_non_node_error(decimals)
            }
        })
        .await
        .context("decimals")
    }

    async fn vault_infos(
        &self,
        vaults: Vec<Address>,
        block: u64,
    ) -> Result<Vec<Output<Address, VaultInfo>>> {
        let block = BlockId::number(block);
        let provider = self.provider.clone();
        self.fan_out(vaults, |vault| {
            let provider = provider.clone();
            async move {
                let contract = YearnVault::new(vault, provider);
                let token = contract.token().block(block);
                let price_per_share = contract.pricePerShare().block(block);
                let decimals = contract.decimals().block(block);
                let (underlying, price_per_share, decimals) = tokio::join!(
                    token.call().into_future(),
                    price_per_share.call().into_future(),
                    decimals.call().into_future(),
                );
                let underlying = ignore_non_node_error(underlying)?;
                let price_per_share = ignore_non_node_error(price_per_share)?;
                let decimals = ignore_non_node_error(decimals)?;
                Ok(underlying
                    .zip(price_per_share)
                    .zip(decimals)
                    .map(|((underlying, price_per_share), decimals)| VaultInfo {
                        underlying,
                        price_per_share,
                        decimals,
                    }))
            }
        })
        .await
        .context("yearn vault info")
    }

    async fn money_market_infos(
        &self,
        tokens: Vec<Address>,
        block: u64,
    ) -> Result<Vec<Output<Address, MoneyMarketInfo>>> {
        let block = BlockId::number(block);
        let provider = self.provider.clone();
        self.fan_out(tokens, |token| {
            let provider = provider.clone();
            async move {
                let contract = CToken::new(token, provider);
                let rate = contract.exchangeRateStored().block(block);
                let underlying = contract.underlying().block(block);
                let (rate, underlying) =
                    tokio::join!(rate.call().into_future(), underlying.call().into_future());
                let rate = ignore_non_node_error(rate)?;
                let underlying = ignore_non_node_error(underlying)?;
                Ok(underlying
                    .zip(rate)
                    .map(|(underlying, exchange_rate)| MoneyMarketInfo {
                        underlying,
                        exchange_rate,
                    }))
            }
        })
        .await
        .context("money market info")
    }
}
