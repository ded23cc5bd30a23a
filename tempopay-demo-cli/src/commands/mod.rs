//! CLI command implementations

pub mod activity;
pub mod billing;
pub mod init;
pub mod pay;
pub mod subscriptions;
pub mod wallet;

use anyhow::{anyhow, Result};
use tempopay_lib::Amount;

/// Parse a decimal amount given on the command line.
pub fn parse_amount(input: &str) -> Result<Amount> {
    Amount::from_str_checked(input.trim()).map_err(|_| anyhow!("Invalid amount: {}", input))
}
