use {
    super::Context,
    crate::{
        config::FxToken,
        domain::{TokenKey, UnwrapError},
    },
    anyhow::{Context as _, Result, anyhow},
    bigdecimal::BigDecimal,
    futures::future::try_join_all,
    number::fixed_point::value_in_units,
    std::collections::{BTreeSet, HashMap},
};

/// Values tokens pegged to non-USD fiat currencies in USD.
pub async fn unwrap(ctx: &Context<'_>, tokens: &[FxToken]) -> Result<usize> {
    let held: Vec<_> = tokens
        .iter()
        .filter(|token| ctx.holds(token.address))
        .collect();
    if held.is_empty() {
        return Ok(0);
    }

    let currencies: BTreeSet<_> = held.iter().map(|token| token.currency.as_str()).collect();
    let rates = async {
        let rates = try_join_all(currencies.into_iter().map(|currency| async move {
            let rate = ctx
                .rates
                .usd_rate(currency)
                .await
                .with_context(|| format!("fetching {currency} rate"))?
                .ok_or_else(|| UnwrapError::MissingRate(currency.to_owned()))?;
            Ok::<_, anyhow::Error>((currency, rate))
        }))
        .await?;
        Ok::<HashMap<_, BigDecimal>, anyhow::Error>(rates.into_iter().collect())
    };
    let decimals = ctx.reader.decimals(
        held.iter().map(|token| token.address).collect(),
        ctx.block,
    );
    let (rates, decimals) = futures::try_join!(rates, decimals)?;
    let decimals: HashMap<_, _> = decimals
        .into_iter()
        .map(|output| (output.input, output.output))
        .collect();

    let mut unwrapped = 0;
    for token in held {
        let rate = &rates[token.currency.as_str()];
        let decimals = decimals
            .get(&token.address)
            .copied()
            .flatten()
            .ok_or_else(|| anyhow!("token {} did not report its decimals", token.address))?;
        let Some(balance) = ctx.take(token.address) else {
            continue;
        };
        ctx.ledger
            .add(TokenKey::usd(), value_in_units(&balance, rate, decimals.into()));
        unwrapped += 1;
    }
    Ok(unwrapped)
}
