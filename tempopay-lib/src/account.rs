//! Signing accounts.
//!
//! A [`RootAccount`] is the user's authenticated account (passkey-backed in
//! the browser wallet). It can sign transactions and, when it supports
//! delegation, sign key authorizations for locally generated access keys.
//! An [`AccessAccount`] is the constrained capability derived from such a
//! key: it spends from the root account's balance within the authorized
//! limits.

use async_trait::async_trait;

use crate::{
    Address, DelegatedKey, KeyPair, KeyType, Result, Signature, SignedKeyAuthorization,
    TokenLimit, WalletError,
};

/// Anything that can sign a transaction.
pub trait TransactionSigner: Send + Sync {
    /// Account whose balance the transaction spends.
    fn sender(&self) -> Address;

    /// Key producing the signature. Equals [`Self::sender`] for root keys.
    fn key_id(&self) -> Address;

    /// Sign transaction bytes.
    fn sign(&self, message: &[u8]) -> Result<Signature>;
}

/// The user's primary signing account.
#[async_trait]
pub trait RootAccount: TransactionSigner {
    /// View as a plain transaction signer.
    fn as_signer(&self) -> &dyn TransactionSigner;

    /// Whether this account can sign key authorizations.
    fn supports_key_authorization(&self) -> bool;

    /// Sign an authorization delegating `key` until `expiry` (unix seconds)
    /// within `limits`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Unsupported`] if the account lacks the
    /// capability.
    async fn sign_key_authorization(
        &self,
        key: DelegatedKey,
        expiry: i64,
        limits: Vec<TokenLimit>,
    ) -> Result<SignedKeyAuthorization>;

    /// Derive the access capability for a delegated key pair.
    fn derive_access_account(&self, key_pair: &KeyPair) -> Result<AccessAccount> {
        if !self.supports_key_authorization() {
            return Err(WalletError::Unsupported(
                "account cannot delegate access keys".into(),
            ));
        }
        Ok(AccessAccount::new(self.sender(), key_pair.clone()))
    }
}

/// Delegated signing capability scoped to a root account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessAccount {
    root: Address,
    key_pair: KeyPair,
}

impl AccessAccount {
    /// Bind a delegated key pair to a root account.
    pub fn new(root: Address, key_pair: KeyPair) -> Self {
        Self { root, key_pair }
    }

    /// The root account this key spends for.
    pub fn root(&self) -> Address {
        self.root
    }

    /// The delegated key description used in authorizations.
    pub fn delegated_key(&self) -> DelegatedKey {
        DelegatedKey {
            key_id: self.key_pair.key_id(),
            key_type: self.key_type(),
        }
    }

    /// Signature scheme of the delegated key.
    pub fn key_type(&self) -> KeyType {
        self.key_pair.key_type()
    }

    /// The key pair backing this capability.
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }
}

impl TransactionSigner for AccessAccount {
    fn sender(&self) -> Address {
        self.root
    }

    fn key_id(&self) -> Address {
        self.key_pair.key_id()
    }

    fn sign(&self, message: &[u8]) -> Result<Signature> {
        Ok(self.key_pair.sign(message))
    }
}
