use {super::Context, crate::config::FixedRemap, number::fixed_point::round_half_up};

/// Moves balances of bridged tokens to their canonical key at a fixed
/// ratio. Only remaps configured for the context's chain apply.
pub fn unwrap(ctx: &Context<'_>, remaps: &[FixedRemap]) -> usize {
    let mut unwrapped = 0;
    for remap in remaps.iter().filter(|remap| &remap.chain == ctx.chain) {
        let Some(balance) = ctx.take(remap.token) else {
            continue;
        };
        ctx.ledger
            .add(remap.target.clone(), round_half_up(&(balance * &remap.multiplier)));
        unwrapped += 1;
    }
    unwrapped
}
