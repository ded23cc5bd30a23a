//! One-off payments from the root account.

use serde::{Deserialize, Serialize};

use crate::{
    Address, Amount, ChainGateway, Memo, Result, RootAccount, Token, TokenTransfer,
    TransactionReceipt, WalletError,
};

/// Maximum number of fractional digits a user may enter.
pub const MAX_PAYMENT_DECIMALS: u32 = 2;

/// A payment the user is about to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDraft {
    /// Recipient address
    pub recipient: Address,
    /// Amount in whole token units
    pub amount: Amount,
    /// Optional memo text (at most 32 bytes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl PaymentDraft {
    /// Create a draft without a memo.
    pub fn new(recipient: Address, amount: Amount) -> Self {
        Self {
            recipient,
            amount,
            memo: None,
        }
    }

    /// Attach a memo. Empty text means no memo.
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        let memo = memo.into();
        self.memo = if memo.is_empty() { None } else { Some(memo) };
        self
    }

    /// Check the draft and build the transfer it describes.
    ///
    /// `balance` is the sender's balance in whole units, if known.
    pub fn validate(&self, token: &Token, balance: Option<Amount>) -> Result<TokenTransfer> {
        if !self.amount.is_positive() {
            return Err(WalletError::invalid_data("amount", "must be greater than zero"));
        }
        if self.amount.scale() > MAX_PAYMENT_DECIMALS {
            return Err(WalletError::invalid_data(
                "amount",
                format!("at most {} decimal places", MAX_PAYMENT_DECIMALS),
            ));
        }

        let units = token.to_units(&self.amount)?;
        if let Some(balance) = balance {
            if !self.amount.is_within_limit(&balance) {
                return Err(WalletError::InsufficientBalance {
                    required: units,
                    available: token.to_units(&balance).unwrap_or(0),
                });
            }
        }

        let mut transfer = TokenTransfer::new(token.address, self.recipient, units);
        if let Some(text) = &self.memo {
            transfer = transfer.with_memo(Memo::from_text(text)?);
        }
        Ok(transfer)
    }
}

/// Send a payment signed by the root account and wait for confirmation.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(gateway, root, token), fields(to = %draft.recipient, amount = %draft.amount)))]
pub async fn send_payment(
    gateway: &dyn ChainGateway,
    root: &dyn RootAccount,
    token: &Token,
    draft: &PaymentDraft,
) -> Result<TransactionReceipt> {
    let available = gateway.balance_of(&token.address, &root.sender()).await?;
    let balance = token.to_amount(available)?;
    let transfer = draft.validate(token, Some(balance))?;

    let submitted = gateway.submit_transfer(root.as_signer(), &transfer).await?;
    let receipt = gateway.wait_for_confirmation(&submitted.tx_hash).await?;
    if !receipt.success {
        return Err(WalletError::Transport(format!(
            "transaction {} reverted",
            receipt.tx_hash
        )));
    }

    #[cfg(feature = "tracing")]
    tracing::info!(tx = %receipt.tx_hash, "payment confirmed");
    Ok(receipt)
}
