use {
    super::Context,
    crate::domain::{Address, UnwrapError},
    anyhow::Result,
    number::{
        conversions::u256_to_big_decimal,
        fixed_point::{WAD_DECIMALS, mul_div_pow10},
    },
};

/// Replaces money market receipt tokens with the underlying they are worth
/// at the stored exchange rate.
pub async fn unwrap(ctx: &Context<'_>, tokens: &[Address]) -> Result<usize> {
    let held = ctx.held(tokens);
    if held.is_empty() {
        return Ok(0);
    }

    let infos = ctx.reader.money_market_infos(held, ctx.block).await?;
    let mut unwrapped = 0;
    for info in infos {
        let token = info.input;
        let info = info.output.ok_or(UnwrapError::MissingExchangeRate(token))?;
        let Some(balance) = ctx.take(token) else {
            continue;
        };
        let underlying = mul_div_pow10(
            &balance,
            &u256_to_big_decimal(&info.exchange_rate),
            WAD_DECIMALS,
        );
        ctx.ledger
            .add(ctx.transform.key(info.underlying), underlying);
        unwrapped += 1;
    }
    Ok(unwrapped)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            infra::reader::{MoneyMarketInfo, Output},
            pipeline::unwrap::tests::Mocks,
        },
        alloy::primitives::U256,
        bigdecimal::BigDecimal,
    };

    #[tokio::test]
    async fn credits_underlying_at_exchange_rate() {
        let receipt = Address::repeat_byte(0xc1);
        let usdc = Address::repeat_byte(0x0c);
        let mut mocks = Mocks::new("ethereum");
        mocks
            .reader
            .expect_money_market_infos()
            .times(1)
            .returning(move |tokens, _| {
                Ok(tokens
                    .into_iter()
                    .map(|token| {
                        Output::new(
                            token,
                            Some(MoneyMarketInfo {
                                underlying: usdc,
                                exchange_rate: U256::from(200_000_000_000_000_000u64),
                            }),
                        )
                    })
                    .collect())
            });
        mocks.ledger.add(mocks.key(receipt), BigDecimal::from(1_000_000));

        let count = unwrap(&mocks.ctx(), &[receipt]).await.unwrap();

        assert_eq!(count, 1);
        assert!(!mocks.ledger.contains(&mocks.key(receipt)));
        assert_eq!(
            mocks.ledger.get(&mocks.key(usdc)),
            Some(BigDecimal::from(200_000))
        );
    }

    #[tokio::test]
    async fn rounds_half_up() {
        let receipt = Address::repeat_byte(0xc1);
        let usdc = Address::repeat_byte(0x0c);
        let mut mocks = Mocks::new("ethereum");
        mocks.reader.expect_money_market_infos().returning(move |tokens, _| {
            Ok(tokens
                .into_iter()
                .map(|token| {
                    Output::new(
                        token,
                        Some(MoneyMarketInfo {
                            underlying: usdc,
                            exchange_rate: U256::from(500_000_000_000_000_000u64),
                        }),
                    )
                })
                .collect())
        });
        mocks.ledger.add(mocks.key(receipt), BigDecimal::from(3));

        unwrap(&mocks.ctx(), &[receipt]).await.unwrap();
        assert_eq!(mocks.ledger.get(&mocks.key(usdc)), Some(BigDecimal::from(2)));
    }

    #[tokio::test]
    async fn missing_rate_is_an_error() {
        let receipt = Address::repeat_byte(0xc1);
        let mut mocks = Mocks::new("ethereum");
        mocks
            .reader
            .expect_money_market_infos()
            .returning(|tokens, _| Ok(tokens.into_iter().map(|t| Output::new(t, None)).collect()));
        mocks.ledger.add(mocks.key(receipt), BigDecimal::from(1));

        let err = unwrap(&mocks.ctx(), &[receipt]).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<UnwrapError>(),
            Some(&UnwrapError::MissingExchangeRate(receipt))
        );
    }
}
