//! Pay command - send AlphaUSD from the root account

use anyhow::{anyhow, Result};
use std::path::Path;
use tempopay_lib::{send_payment, Address, PaymentDraft};

use crate::session::Session;
use crate::ui;

#[tracing::instrument(skip(storage_dir, memo))]
pub async fn run(
    storage_dir: &Path,
    recipient: &str,
    amount: &str,
    memo: Option<String>,
) -> Result<()> {
    let to = Address::parse(recipient).map_err(|_| anyhow!("Invalid address: {}", recipient))?;
    let amount = super::parse_amount(amount)?;

    let session = Session::open(storage_dir).await?;

    ui::header("Send Payment");
    ui::key_value("From", &session.root.address().to_string());
    ui::key_value("To", &to.to_string());
    ui::key_value("Amount", &ui::usd(&amount));
    if let Some(memo) = &memo {
        ui::key_value("Memo", memo);
    }

    let mut draft = PaymentDraft::new(to, amount);
    if let Some(memo) = memo {
        draft = draft.with_memo(memo);
    }

    let receipt = send_payment(
        session.chain.as_ref(),
        session.root.as_ref(),
        &session.token,
        &draft,
    )
    .await?;

    ui::separator();
    ui::success("Payment confirmed");
    ui::key_value("Transaction", &receipt.tx_hash.to_string());
    ui::key_value("Block", &receipt.block_number.to_string());
    ui::key_value("Balance", &ui::usd(&session.balance().await?));
    session.close()
}
