use {
    super::summation,
    crate::{
        config::Staking,
        domain::Ledger,
        infra::{BatchReading, Transform},
    },
    anyhow::Result,
};

/// Governance tokens locked in the voting escrow.
pub async fn locked(
    reader: &dyn BatchReading,
    staking: &Staking,
    transform: &Transform,
    block: u64,
) -> Result<Ledger> {
    let ledger = Ledger::new();
    summation::sum_shared_owners(
        &ledger,
        reader,
        &[staking.escrow],
        &[staking.token],
        block,
        |token| transform.key(token),
    )
    .await?;
    Ok(ledger)
}
