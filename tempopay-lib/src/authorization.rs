//! Key authorizations: a root account delegating spend rights to an access
//! key, bounded by an expiry and per-token limits.

use serde::{Deserialize, Serialize};

use crate::{Address, KeyType, Result, Signature, WalletError};

/// Domain separator mixed into every authorization signature.
const AUTHORIZATION_DOMAIN: &[u8] = b"tempopay:key-authorization:v1";

/// The key being delegated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelegatedKey {
    /// Address of the delegated key.
    pub key_id: Address,
    /// Signature scheme of the delegated key.
    pub key_type: KeyType,
}

/// Maximum amount of one token the delegated key may move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLimit {
    /// Token contract address.
    pub token: Address,
    /// Limit in minor units.
    pub limit: u128,
}

/// Unsigned authorization payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAuthorization {
    /// Delegated key.
    pub key: DelegatedKey,
    /// Unix timestamp (seconds) after which the key is invalid.
    pub expiry: i64,
    /// Spend limits per token.
    pub limits: Vec<TokenLimit>,
}

impl KeyAuthorization {
    /// Create a new authorization payload.
    pub fn new(key: DelegatedKey, expiry: i64, limits: Vec<TokenLimit>) -> Self {
        Self {
            key,
            expiry,
            limits,
        }
    }

    /// Bytes covered by the root signature.
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let mut payload = AUTHORIZATION_DOMAIN.to_vec();
        payload.extend(serde_json::to_vec(self)?);
        Ok(payload)
    }

    /// Whether the authorization has lapsed at `now_secs`.
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        now_secs >= self.expiry
    }

    /// Limit granted for `token`, if any.
    pub fn limit_for(&self, token: &Address) -> Option<u128> {
        self.limits
            .iter()
            .find(|l| &l.token == token)
            .map(|l| l.limit)
    }
}

/// Authorization signed by the root account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedKeyAuthorization {
    /// Authorization payload.
    pub authorization: KeyAuthorization,
    /// Root account signature over [`KeyAuthorization::signing_payload`].
    pub signature: Signature,
}

impl SignedKeyAuthorization {
    /// Delegated key id.
    pub fn key_id(&self) -> Address {
        self.authorization.key.key_id
    }

    /// Expiry in unix seconds.
    pub fn expiry(&self) -> i64 {
        self.authorization.expiry
    }

    /// Address of the root account that signed.
    pub fn root(&self) -> Address {
        self.signature.signer()
    }

    /// Check the signature and that it was made by `root`.
    pub fn verify(&self, root: &Address) -> Result<()> {
        if &self.root() != root {
            return Err(WalletError::key_rejected(
                self.key_id(),
                format!("authorization signed by {}, expected {}", self.root(), root),
            ));
        }
        let payload = self.authorization.signing_payload()?;
        if !self.signature.verify(&payload) {
            return Err(WalletError::key_rejected(
                self.key_id(),
                "invalid authorization signature",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyPair, ALPHA_USD_ADDRESS};

    fn signed(root: &KeyPair, delegated: &KeyPair) -> SignedKeyAuthorization {
        let authorization = KeyAuthorization::new(
            DelegatedKey {
                key_id: delegated.key_id(),
                key_type: delegated.key_type(),
            },
            1_700_000_780,
            vec![TokenLimit {
                token: ALPHA_USD_ADDRESS,
                limit: 288_000_000,
            }],
        );
        let signature = root.sign(&authorization.signing_payload().unwrap());
        SignedKeyAuthorization {
            authorization,
            signature,
        }
    }

    #[test]
    fn test_verify_accepts_root_signature() {
        let root = KeyPair::generate();
        let delegated = KeyPair::generate();
        let auth = signed(&root, &delegated);
        assert!(auth.verify(&root.key_id()).is_ok());
        assert_eq!(auth.key_id(), delegated.key_id());
        assert_eq!(auth.authorization.limit_for(&ALPHA_USD_ADDRESS), Some(288_000_000));
    }

    #[test]
    fn test_verify_rejects_other_root() {
        let root = KeyPair::generate();
        let delegated = KeyPair::generate();
        let auth = signed(&root, &delegated);
        assert!(auth.verify(&KeyPair::generate().key_id()).is_err());
    }

    #[test]
    fn test_verify_rejects_tampered_limits() {
        let root = KeyPair::generate();
        let delegated = KeyPair::generate();
        let mut auth = signed(&root, &delegated);
        auth.authorization.limits[0].limit = u128::MAX;
        assert!(auth.verify(&root.key_id()).is_err());
    }

    #[test]
    fn test_expiry_boundary() {
        let root = KeyPair::generate();
        let auth = signed(&root, &KeyPair::generate());
        assert!(!auth.authorization.is_expired_at(1_700_000_779));
        assert!(auth.authorization.is_expired_at(1_700_000_780));
    }
}
