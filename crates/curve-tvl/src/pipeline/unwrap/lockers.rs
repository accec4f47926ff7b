use {
    super::Context,
    crate::domain::{Address, TokenKey, UnwrapError},
    anyhow::{Context as _, Result},
    number::fixed_point::value_in_units,
};

/// Values liquid locker receipt tokens in USD using the locker service's
/// price list. The list is only fetched if a locker token is held.
pub async fn unwrap(ctx: &Context<'_>, tokens: &[Address]) -> Result<usize> {
    let held = ctx.held(tokens);
    if held.is_empty() {
        return Ok(0);
    }

    let prices = ctx
        .lockers
        .locker_prices()
        .await
        .context("fetching locker prices")?;
    let mut unwrapped = 0;
    for token in held {
        let price = prices
            .iter()
            .find(|price| price.token == token)
            .ok_or(UnwrapError::MissingLockerPrice(token))?;
        let Some(balance) = ctx.take(token) else {
            continue;
        };
        ctx.ledger.add(
            TokenKey::usd(),
            value_in_units(&balance, &price.usd_price, price.decimals.into()),
        );
        unwrapped += 1;
    }
    Ok(unwrapped)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{infra::prices::LockerPrice, pipeline::unwrap::tests::Mocks},
        bigdecimal::BigDecimal,
        std::str::FromStr,
    };

    fn price(token: Address, usd: &str) -> LockerPrice {
        LockerPrice {
            token,
            decimals: 18,
            usd_price: BigDecimal::from_str(usd).unwrap(),
        }
    }

    #[tokio::test]
    async fn credits_usd_value_with_one_fetch() {
        let sd_crv = Address::repeat_byte(0x5c);
        let sd_fxs = Address::repeat_byte(0x5f);
        let mut mocks = Mocks::new("ethereum");
        mocks
            .lockers
            .expect_locker_prices()
            .times(1)
            .returning(move || Ok(vec![price(sd_crv, "0.5"), price(sd_fxs, "7.25")]));
        mocks.ledger.add(
            mocks.key(sd_crv),
            BigDecimal::from_str("3000000000000000000").unwrap(),
        );
        mocks.ledger.add(
            mocks.key(sd_fxs),
            BigDecimal::from_str("2000000000000000000").unwrap(),
        );

        let count = unwrap(&mocks.ctx(), &[sd_crv, sd_fxs, Address::repeat_byte(0x5a)])
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(mocks.ledger.len(), 1);
        assert_eq!(
            mocks.ledger.get(&TokenKey::usd()),
            Some(BigDecimal::from_str("16").unwrap())
        );
    }

    #[tokio::test]
    async fn unlisted_held_token_is_an_error() {
        let sd_crv = Address::repeat_byte(0x5c);
        let mut mocks = Mocks::new("ethereum");
        mocks.lockers.expect_locker_prices().returning(|| Ok(vec![]));
        mocks.ledger.add(mocks.key(sd_crv), BigDecimal::from(1));

        let err = unwrap(&mocks.ctx(), &[sd_crv]).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<UnwrapError>(),
            Some(&UnwrapError::MissingLockerPrice(sd_crv))
        );
    }
}
