//! Init command - create a new wallet

use anyhow::Result;
use std::path::Path;
use tempopay_lib::testnet::LocalRootAccount;

use crate::session;
use crate::ui;

pub async fn run(storage_dir: &Path, force: bool, verbose: bool) -> Result<()> {
    ui::header("Create Wallet");

    if session::identity_path(storage_dir).exists()
        && !force
        && !ui::confirm("A wallet already exists here. Replace it?", false)?
    {
        ui::info("Init cancelled");
        return Ok(());
    }

    if verbose {
        ui::info(&format!("Using storage at {}", storage_dir.display()));
    }

    let account = LocalRootAccount::generate();
    session::save_identity(storage_dir, &account)?;

    // Subscriptions belong to the old key; they cannot be restored under a new one.
    let store = storage_dir.join("store");
    if store.exists() {
        std::fs::remove_dir_all(&store)?;
    }

    tracing::info!(address = %account.address(), "wallet created");
    ui::success("Wallet created");
    ui::separator();
    ui::key_value("Address", &account.address().to_string());
    ui::info("Run 'tempopay-demo fund 100' to mint testnet AlphaUSD");

    Ok(())
}
