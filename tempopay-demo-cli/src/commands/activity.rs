//! Activity command - recent transfers in and out of the wallet

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::path::Path;
use tempopay_lib::{build_history, ChainGateway, TransferDirection};

use crate::session::Session;
use crate::ui;

pub async fn run(storage_dir: &Path, limit: usize) -> Result<()> {
    let session = Session::open(storage_dir).await?;
    let owner = session.root.address();
    let logs = session
        .chain
        .transfer_logs(&session.token.address, &owner, 0)
        .await?;
    let records = build_history(&owner, &session.token, &logs, limit)?;

    ui::header("Activity");
    if records.is_empty() {
        ui::info("No transfers yet.");
    }
    for record in &records {
        let when = DateTime::<Utc>::from_timestamp(record.timestamp, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let (sign, amount) = match record.direction {
            TransferDirection::Sent => ("-", ui::usd(&record.amount).red()),
            TransferDirection::Received => ("+", ui::usd(&record.amount).green()),
        };
        println!(
            "  {}  {}{:<10}  {}  {}",
            when.dimmed(),
            sign,
            amount,
            record.counterparty,
            record.memo.as_deref().unwrap_or("")
        );
    }
    session.close()
}
