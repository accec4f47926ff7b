//! Passes replacing derivative tokens in a ledger with what they are
//! worth in their underlying asset.
//!
//! Every pass only touches tokens that are held, so running a pass on a
//! ledger without such tokens changes nothing and reads nothing.

use {
    crate::{
        config::{ChainConfig, FixedRemap},
        domain::{Address, Chain, Ledger},
        infra::{BatchReading, CurrencyRates, LockerPricing, Transform, observe},
    },
    anyhow::{Context as _, Result},
    bigdecimal::BigDecimal,
};

mod cream;
mod fx;
mod lockers;
mod remap;
mod yearn;

/// Everything a pass needs to know about the snapshot it runs in.
pub struct Context<'a> {
    pub chain: &'a Chain,
    pub block: u64,
    pub ledger: &'a Ledger,
    pub transform: &'a Transform,
    pub reader: &'a dyn BatchReading,
    pub lockers: &'a dyn LockerPricing,
    pub rates: &'a dyn CurrencyRates,
}

impl Context<'_> {
    /// Whether the ledger holds `token` under its transformed or its raw key.
    fn holds(&self, token: Address) -> bool {
        self.ledger.contains(&self.transform.key(token))
            || self.ledger.contains(&self.transform.raw_key(token))
    }

    /// Removes `token` from the ledger and returns how much of it was held.
    fn take(&self, token: Address) -> Option<BigDecimal> {
        let key = self.transform.key(token);
        let raw = self.transform.raw_key(token);
        let mut held = self.ledger.remove(&key);
        if raw != key {
            if let Some(amount) = self.ledger.remove(&raw) {
                held = Some(held.unwrap_or_default() + amount);
            }
        }
        held
    }

    fn held(&self, tokens: &[Address]) -> Vec<Address> {
        tokens
            .iter()
            .copied()
            .filter(|token| self.holds(*token))
            .collect()
    }
}

/// Runs all passes in order.
pub async fn run(ctx: &Context<'_>, config: &ChainConfig, fixed_remaps: &[FixedRemap]) -> Result<()> {
    let count = yearn::unwrap(ctx, &config.yearn_tokens)
        .await
        .context("unwrapping yearn vaults")?;
    observe::unwrapped(ctx.chain, "yearn", count);

    let count = cream::unwrap(ctx, &config.cream_tokens)
        .await
        .context("unwrapping money market tokens")?;
    observe::unwrapped(ctx.chain, "cream", count);

    let count = lockers::unwrap(ctx, &config.sd_tokens)
        .await
        .context("unwrapping locker tokens")?;
    observe::unwrapped(ctx.chain, "lockers", count);

    let count = fx::unwrap(ctx, &config.fx_tokens)
        .await
        .context("converting fiat pegged tokens")?;
    observe::unwrapped(ctx.chain, "fx", count);

    let count = remap::unwrap(ctx, fixed_remaps);
    observe::unwrapped(ctx.chain, "remap", count);
    Ok(())
}
