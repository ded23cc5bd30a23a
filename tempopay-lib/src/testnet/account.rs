//! Local stand-in for the passkey root account.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    Address, DelegatedKey, KeyAuthorization, KeyPair, Result, RootAccount, Signature,
    SignedKeyAuthorization, TokenLimit, TransactionSigner, WalletError,
};

fn delegation_enabled() -> bool {
    true
}

/// Root account backed by a local Ed25519 key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalRootAccount {
    key_pair: KeyPair,
    #[serde(default = "delegation_enabled")]
    delegation: bool,
}

impl LocalRootAccount {
    /// Wrap an existing key pair.
    pub fn new(key_pair: KeyPair) -> Self {
        Self {
            key_pair,
            delegation: true,
        }
    }

    /// Create an account with a fresh key.
    pub fn generate() -> Self {
        Self::new(KeyPair::generate())
    }

    /// Disable key authorization signing (an account type without delegation).
    pub fn without_delegation(mut self) -> Self {
        self.delegation = false;
        self
    }

    /// Account address.
    pub fn address(&self) -> Address {
        self.key_pair.key_id()
    }
}

impl TransactionSigner for LocalRootAccount {
    fn sender(&self) -> Address {
        self.address()
    }

    fn key_id(&self) -> Address {
        self.address()
    }

    fn sign(&self, message: &[u8]) -> Result<Signature> {
        Ok(self.key_pair.sign(message))
    }
}

#[async_trait]
impl RootAccount for LocalRootAccount {
    fn as_signer(&self) -> &dyn TransactionSigner {
        self
    }

    fn supports_key_authorization(&self) -> bool {
        self.delegation
    }

    async fn sign_key_authorization(
        &self,
        key: DelegatedKey,
        expiry: i64,
        limits: Vec<TokenLimit>,
    ) -> Result<SignedKeyAuthorization> {
        if !self.delegation {
            return Err(WalletError::Unsupported(
                "account cannot sign key authorizations".into(),
            ));
        }
        let authorization = KeyAuthorization::new(key, expiry, limits);
        let signature = self.key_pair.sign(&authorization.signing_payload()?);
        Ok(SignedKeyAuthorization {
            authorization,
            signature,
        })
    }
}
