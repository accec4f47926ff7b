//! Reading balances into the ledger.

use {
    crate::{
        domain::{Address, Ledger, Target, TokenKey},
        infra::{BatchReading, Transform, reader::Output},
    },
    alloy::primitives::U256,
    anyhow::Result,
    itertools::Itertools,
    std::collections::HashSet,
};

/// Reads the balance of every target and adds it to the ledger under the
/// transformed key of its token. Targets of excluded tokens are never read
/// and repeated targets are read once.
pub async fn sum(
    ledger: &Ledger,
    reader: &dyn BatchReading,
    targets: Vec<Target>,
    block: u64,
    transform: &Transform,
    excluded: &HashSet<Address>,
) -> Result<()> {
    let targets = targets
        .into_iter()
        .filter(|target| !excluded.contains(&target.token))
        .unique()
        .collect();
    let balances = reader.balances(targets, block).await?;
    merge(ledger, balances, |token| transform.key(token));
    Ok(())
}

/// Adds the balances every owner holds of every token to the ledger.
pub async fn sum_shared_owners(
    ledger: &Ledger,
    reader: &dyn BatchReading,
    owners: &[Address],
    tokens: &[Address],
    block: u64,
    key: impl Fn(Address) -> TokenKey,
) -> Result<()> {
    let targets = owners
        .iter()
        .cartesian_product(tokens)
        .map(|(&owner, &token)| Target::new(token, owner))
        .unique()
        .collect();
    let balances = reader.balances(targets, block).await?;
    merge(ledger, balances, key);
    Ok(())
}

fn merge(ledger: &Ledger, balances: Vec<Output<Target, U256>>, key: impl Fn(Address) -> TokenKey) {
    for Output { input, output } in balances {
        // Tokens that revert on `balanceOf` hold nothing we can count.
        let Some(balance) = output else {
            tracing::debug!(token = ?input.token, owner = ?input.owner, "balance read failed");
            continue;
        };
        ledger.add(
            key(input.token),
            number::conversions::u256_to_big_decimal(&balance),
        );
    }
}
