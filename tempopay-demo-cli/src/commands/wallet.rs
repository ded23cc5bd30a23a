//! Wallet commands - address, faucet and balance

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::session::{self, Session};
use crate::ui;

pub async fn whoami(storage_dir: &Path) -> Result<()> {
    match session::load_identity(storage_dir) {
        Ok(account) => {
            ui::header("Current Wallet");
            ui::key_value("Address", &account.address().to_string());
        }
        Err(_) => {
            ui::error("No wallet configured");
            ui::info("Run 'tempopay-demo init' to create one");
        }
    }
    Ok(())
}

pub async fn fund(storage_dir: &Path, amount: &str) -> Result<()> {
    let amount = super::parse_amount(amount)?;
    if !amount.is_positive() {
        return Err(anyhow!("Amount must be greater than zero"));
    }

    let session = Session::open(storage_dir).await?;
    let units = session.token.to_units(&amount)?;
    session
        .chain
        .fund(&session.token.address, &session.root.address(), units);
    let balance = session.balance().await?;

    ui::success(&format!("Minted {} AlphaUSD", ui::usd(&amount)));
    ui::key_value("Balance", &ui::usd(&balance));
    session.close()
}

pub async fn balance(storage_dir: &Path) -> Result<()> {
    let session = Session::open(storage_dir).await?;
    let balance = session.balance().await?;

    ui::header("Balance");
    ui::key_value("AlphaUSD", &ui::usd(&balance));
    let active = session
        .engine
        .views()
        .into_iter()
        .filter(|view| view.active)
        .count();
    ui::key_value("Active subscriptions", &active.to_string());
    session.close()
}
