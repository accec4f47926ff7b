use alloy::primitives::{Address, address};

/// Token address standing for a chain's native asset.
pub const NATIVE: Address = Address::ZERO;

/// Placeholder some pools report in their coin list for the native asset.
pub const NATIVE_PLACEHOLDER: Address = address!("0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// A balance that has to be read: how much of `token` does `owner` hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
    pub token: Address,
    pub owner: Address,
}

impl Target {
    /// Creates a target, folding the native asset placeholder into
    /// [`NATIVE`].
    pub fn new(token: Address, owner: Address) -> Self {
        let token = if token == NATIVE_PLACEHOLDER {
            NATIVE
        } else {
            token
        };
        Self { token, owner }
    }

    pub fn native(owner: Address) -> Self {
        Self {
            token: NATIVE,
            owner,
        }
    }

    pub fn is_native(&self) -> bool {
        self.token == NATIVE
    }
}
