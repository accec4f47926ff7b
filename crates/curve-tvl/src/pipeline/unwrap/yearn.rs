use {
    super::Context,
    crate::domain::{Address, UnwrapError},
    anyhow::Result,
    number::{conversions::u256_to_big_decimal, fixed_point::mul_div_pow10},
};

/// Replaces vault shares with the underlying they can be redeemed for at the
/// vault's current share price.
pub async fn unwrap(ctx: &Context<'_>, vaults: &[Address]) -> Result<usize> {
    let held = ctx.held(vaults);
    if held.is_empty() {
        return Ok(0);
    }

    let infos = ctx.reader.vault_infos(held, ctx.block).await?;
    let mut unwrapped = 0;
    for info in infos {
        let vault = info.input;
        let info = info.output.ok_or(UnwrapError::MissingVaultInfo(vault))?;
        let Some(shares) = ctx.take(vault) else {
            continue;
        };
        let underlying = mul_div_pow10(
            &shares,
            &u256_to_big_decimal(&info.price_per_share),
            info.decimals.into(),
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
            infra::reader::{Output, VaultInfo},
            pipeline::unwrap::tests::Mocks,
        },
        alloy::primitives::U256,
        bigdecimal::BigDecimal,
        mockall::predicate::eq,
    };

    #[tokio::test]
    async fn credits_underlying_at_share_price() {
        let vault = Address::repeat_byte(0x1a);
        let dai = Address::repeat_byte(0xda);
        let mut mocks = Mocks::new("ethereum");
        mocks
            .reader
            .expect_vault_infos()
            .with(eq(vec![vault]), eq(1))
            .returning(move |vaults, _| {
                Ok(vaults
                    .into_iter()
                    .map(|vault| {
                        Output::new(
                            vault,
                            Some(VaultInfo {
                                underlying: dai,
                                price_per_share: U256::from(1_050_000_000_000_000_000u64),
                                decimals: 18,
                            }),
                        )
                    })
                    .collect())
            });
        mocks.ledger.add(mocks.key(vault), BigDecimal::from(1_000));
        mocks.ledger.add(mocks.key(dai), BigDecimal::from(5));

        let count = unwrap(&mocks.ctx(), &[vault, Address::repeat_byte(0x2a)])
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(!mocks.ledger.contains(&mocks.key(vault)));
        assert_eq!(mocks.ledger.get(&mocks.key(dai)), Some(BigDecimal::from(1_055)));
    }

    #[tokio::test]
    async fn missing_vault_info_is_an_error() {
        let vault = Address::repeat_byte(0x1a);
        let mut mocks = Mocks::new("ethereum");
        mocks
            .reader
            .expect_vault_infos()
            .returning(|vaults, _| Ok(vaults.into_iter().map(|v| Output::new(v, None)).collect()));
        mocks.ledger.add(mocks.key(vault), BigDecimal::from(1_000));

        let err = unwrap(&mocks.ctx(), &[vault]).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<UnwrapError>(),
            Some(&UnwrapError::MissingVaultInfo(vault))
        );
    }
}
