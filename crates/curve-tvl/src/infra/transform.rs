use {
    crate::domain::{Chain, TokenKey},
    alloy::primitives::Address,
    std::collections::HashMap,
};

/// Maps token addresses of one chain to their canonical ledger keys.
///
/// Tokens default to `chain:address`. Bridged representations can be
/// redirected to the key of the canonical asset, possibly on another chain.
#[derive(Clone, Debug)]
pub struct Transform {
    chain: Chain,
    overrides: HashMap<Address, TokenKey>,
}

impl Transform {
    pub fn new(chain: Chain, overrides: HashMap<Address, TokenKey>) -> Self {
        Self { chain, overrides }
    }

    /// Transform without overrides.
    pub fn identity(chain: Chain) -> Self {
        Self::new(chain, Default::default())
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn key(&self, token: Address) -> TokenKey {
        self.overrides
            .get(&token)
            .cloned()
            .unwrap_or_else(|| TokenKey::on_chain(&self.chain, token))
    }

    /// The untransformed key of `token`.
    pub fn raw_key(&self, token: Address) -> TokenKey {
        TokenKey::on_chain(&self.chain, token)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, maplit::hashmap};

    #[test]
    fn overrides_take_precedence() {
        let bridged = Address::repeat_byte(1);
        let canonical = TokenKey::on_chain(&Chain::new("ethereum"), Address::repeat_byte(2));
        let transform = Transform::new(
            Chain::new("polygon"),
            hashmap! { bridged => canonical.clone() },
        );

        assert_eq!(transform.key(bridged), canonical);
        assert_eq!(
            transform.key(Address::repeat_byte(3)),
            TokenKey::on_chain(&Chain::new("polygon"), Address::repeat_byte(3))
        );
        assert_eq!(
            transform.raw_key(bridged).to_string(),
            "polygon:0x0101010101010101010101010101010101010101"
        );
    }
}
