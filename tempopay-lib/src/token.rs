//! Token metadata.

use serde::{Deserialize, Serialize};

use crate::{Address, Amount, Result};

/// AlphaUSD stablecoin on the Tempo testnet.
pub const ALPHA_USD_ADDRESS: Address = Address::new([
    0x20, 0xc0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01,
]);

/// Decimal precision of AlphaUSD.
pub const ALPHA_USD_DECIMALS: u32 = 6;

/// A fungible token the wallet moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Token contract address.
    pub address: Address,
    /// Decimal precision used for minor units.
    pub decimals: u32,
}

impl Token {
    /// Create a token description.
    pub fn new(address: Address, decimals: u32) -> Self {
        Self { address, decimals }
    }

    /// The AlphaUSD testnet stablecoin.
    pub fn alpha_usd() -> Self {
        Self::new(ALPHA_USD_ADDRESS, ALPHA_USD_DECIMALS)
    }

    /// Convert a whole-unit amount to this token's minor units.
    pub fn to_units(&self, amount: &Amount) -> Result<u128> {
        amount.to_minor_units(self.decimals)
    }

    /// Convert minor units back to a whole-unit amount.
    pub fn to_amount(&self, units: u128) -> Result<Amount> {
        Amount::from_minor_units(units, self.decimals)
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::alpha_usd()
    }
}
