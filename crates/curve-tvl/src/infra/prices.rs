//! Off-chain price sources used to value tokens that have no on-chain
//! underlying.

use {
    crate::infra::observe,
    alloy::primitives::Address,
    anyhow::{Context, Result, anyhow},
    bigdecimal::BigDecimal,
    reqwest::Client,
    serde::Deserialize,
    url::Url,
};

/// USD price of one liquid locker receipt token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockerPrice {
    pub token: Address,
    pub decimals: u8,
    pub usd_price: BigDecimal,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LockerPricing: Send + Sync {
    /// The full price list of the locker service.
    async fn locker_prices(&self) -> Result<Vec<LockerPrice>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CurrencyRates: Send + Sync {
    /// How many USD one unit of `currency` is worth.
    async fn usd_rate(&self, currency: &str) -> Result<Option<BigDecimal>>;
}

/// Price list served by the StakeDAO lockers API.
pub struct StakeDaoLockers {
    client: Client,
    url: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Locker {
    token_receipt: TokenReceipt,
    #[serde(rename = "tokenPriceUSD")]
    token_price_usd: f64,
}

#[derive(Debug, Deserialize)]
struct TokenReceipt {
    address: Address,
    decimals: u8,
}

impl StakeDaoLockers {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait::async_trait]
impl LockerPricing for StakeDaoLockers {
    async fn locker_prices(&self) -> Result<Vec<LockerPrice>> {
        let response = get(&self.client, &self.url).await?;
        parse_lockers(&response)
    }
}

fn parse_lockers(response: &str) -> Result<Vec<LockerPrice>> {
    serde_json::from_str::<Vec<Locker>>(response)
        .with_context(|| format!("failed to parse locker list: {response:?}"))?
        .into_iter()
        .map(|locker| {
            Ok(LockerPrice {
                token: locker.token_receipt.address,
                decimals: locker.token_receipt.decimals,
                usd_price: number::conversions::f64_to_big_decimal(locker.token_price_usd)?,
            })
        })
        .collect()
}

/// Currency conversion rates served by an exchangerate.host compatible API.
pub struct ExchangeRateHost {
    client: Client,
    url: Url,
}

#[derive(Debug, Deserialize)]
struct Conversion {
    result: Option<f64>,
}

impl ExchangeRateHost {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait::async_trait]
impl CurrencyRates for ExchangeRateHost {
    async fn usd_rate(&self, currency: &str) -> Result<Option<BigDecimal>> {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("from", currency)
            .append_pair("to", "USD");
        let response = get(&self.client, &url).await?;
        parse_conversion(&response)
    }
}

fn parse_conversion(response: &str) -> Result<Option<BigDecimal>> {
    serde_json::from_str::<Conversion>(response)
        .with_context(|| format!("failed to parse conversion: {response:?}"))?
        .result
        .map(number::conversions::f64_to_big_decimal)
        .transpose()
}

async fn get(client: &Client, url: &Url) -> Result<String> {
    observe::http_request(url);
    let response = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("failed to send request to {url}"))?;
    if !response.status().is_success() {
        return Err(anyhow!(
            "{url} returned non-success status code: {}",
            response.status()
        ));
    }
    let response = response.text().await;
    observe::http_response(url, response.as_ref());
    response.context("failed to fetch response body")
}
