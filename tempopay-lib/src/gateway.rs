//! Chain action gateway.
//!
//! The wallet needs only a handful of chain operations: token transfers
//! (optionally carrying a key authorization), key revocation, confirmation
//! waits, balance reads and transfer logs. [`ChainGateway`] names them; RPC
//! clients and the in-process [`crate::testnet::SimulatedChain`] implement it.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::{Address, Memo, Result, RootAccount, SignedKeyAuthorization, TransactionSigner};

/// Transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    /// Hash arbitrary transaction bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(s.strip_prefix("0x").unwrap_or(&s), &mut out)
            .map_err(serde::de::Error::custom)?;
        Ok(Self(out))
    }
}

/// A token transfer instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    /// Token contract.
    pub token: Address,
    /// Recipient.
    pub to: Address,
    /// Amount in minor units.
    pub amount: u128,
    /// Optional 32-byte memo.
    pub memo: Option<Memo>,
    /// Authorization registering the signing key, attached on first use.
    pub key_authorization: Option<SignedKeyAuthorization>,
}

impl TokenTransfer {
    /// Create a plain transfer.
    pub fn new(token: Address, to: Address, amount: u128) -> Self {
        Self {
            token,
            to,
            amount,
            memo: None,
            key_authorization: None,
        }
    }

    /// Attach a memo.
    pub fn with_memo(mut self, memo: Memo) -> Self {
        self.memo = Some(memo);
        self
    }

    /// Attach a key authorization.
    pub fn with_key_authorization(mut self, authorization: SignedKeyAuthorization) -> Self {
        self.key_authorization = Some(authorization);
        self
    }

    /// Bytes the signer signs, bound to sender, signing key and nonce.
    pub fn signing_payload(&self, sender: &Address, key_id: &Address, nonce: u64) -> Result<Vec<u8>> {
        let mut payload = b"tempopay:transfer:v1".to_vec();
        payload.extend_from_slice(sender.as_bytes());
        payload.extend_from_slice(key_id.as_bytes());
        payload.extend_from_slice(&nonce.to_be_bytes());
        payload.extend(serde_json::to_vec(self)?);
        Ok(payload)
    }
}

/// Result of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Whether execution succeeded.
    pub success: bool,
}

/// A `Transfer`/`TransferWithMemo` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLog {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Position of the log within the transaction.
    pub log_index: u32,
    /// Block number.
    pub block_number: u64,
    /// Block timestamp (unix seconds).
    pub timestamp: i64,
    /// Token contract.
    pub token: Address,
    /// Sender.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Amount in minor units.
    pub amount: u128,
    /// Memo, if the transfer carried one.
    pub memo: Option<Memo>,
}

/// Chain operations the wallet depends on.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Submit a token transfer signed by `signer`.
    ///
    /// # Errors
    ///
    /// A short sender balance must be reported so that
    /// [`crate::WalletError::is_insufficient_balance`] returns true.
    async fn submit_transfer(
        &self,
        signer: &dyn TransactionSigner,
        transfer: &TokenTransfer,
    ) -> Result<TransactionReceipt>;

    /// Submit a key revocation for one of `root`'s delegated keys.
    async fn submit_revoke(&self, root: &dyn RootAccount, key_id: &Address) -> Result<TxHash>;

    /// Wait until a transaction is included.
    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<TransactionReceipt>;

    /// Token balance of `owner` in minor units.
    async fn balance_of(&self, token: &Address, owner: &Address) -> Result<u128>;

    /// Transfer logs touching `account` (as sender or recipient) since `from_block`.
    async fn transfer_logs(
        &self,
        token: &Address,
        account: &Address,
        from_block: u64,
    ) -> Result<Vec<TransferLog>>;

    /// Latest block number.
    async fn block_number(&self) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ALPHA_USD_ADDRESS;

    #[test]
    fn test_signing_payload_binds_nonce() {
        let transfer = TokenTransfer::new(ALPHA_USD_ADDRESS, Address::ZERO, 5);
        let sender = Address::new([1u8; 20]);
        let a = transfer.signing_payload(&sender, &sender, 1).unwrap();
        let b = transfer.signing_payload(&sender, &sender, 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tx_hash_serde() {
        let hash = TxHash::of(b"tx");
        let json = serde_json::to_string(&hash).unwrap();
        let back: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
