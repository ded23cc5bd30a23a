//! Locally generated Ed25519 key material.
//!
//! Both the root account of the simulated testnet and every delegated access
//! key are backed by a [`KeyPair`]. Secret bytes are zeroized on drop and
//! never printed.

use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

use crate::{Address, Result, WalletError};

/// Signature scheme of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Ed25519 (RFC 8032)
    Ed25519,
}

/// Ed25519 key pair.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        let mut secret = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut *secret);
        Self::from_secret_bytes(&secret)
    }

    /// Rebuild from 32 secret bytes.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Rebuild from a hex-encoded secret.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let mut secret = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(secret_hex.trim(), &mut *secret)
            .map_err(|e| WalletError::invalid_data("secret key", e.to_string()))?;
        Ok(Self::from_secret_bytes(&secret))
    }

    /// Scheme of this key.
    pub fn key_type(&self) -> KeyType {
        KeyType::Ed25519
    }

    /// Public key bytes.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Address identifying this key on chain.
    pub fn key_id(&self) -> Address {
        Address::from_public_key(&self.public_key())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature {
            public_key: self.public_key(),
            bytes: self.signing_key.sign(message).to_bytes(),
        }
    }

    fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.signing_key.to_bytes()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_id", &self.key_id())
            .finish_non_exhaustive()
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for KeyPair {}

#[derive(Serialize, Deserialize)]
struct KeyPairRepr {
    key_type: KeyType,
    public_key: String,
    secret_key: String,
}

impl Serialize for KeyPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let secret = self.secret_hex();
        KeyPairRepr {
            key_type: self.key_type(),
            public_key: hex::encode(self.public_key()),
            secret_key: secret.to_string(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KeyPair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = KeyPairRepr::deserialize(deserializer)?;
        let secret = Zeroizing::new(repr.secret_key);
        let pair = KeyPair::from_secret_hex(&secret).map_err(serde::de::Error::custom)?;
        if hex::encode(pair.public_key()) != repr.public_key.to_lowercase() {
            return Err(serde::de::Error::custom(
                "public key does not match secret key",
            ));
        }
        Ok(pair)
    }
}

/// Detached signature together with the public key that produced it.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    /// Signer public key
    pub public_key: [u8; 32],
    /// Signature bytes
    pub bytes: [u8; 64],
}

impl Signature {
    /// Address of the key that produced this signature.
    pub fn signer(&self) -> Address {
        Address::from_public_key(&self.public_key)
    }

    /// Verify against a message.
    pub fn verify(&self, message: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.public_key) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&self.bytes);
        key.verify(message, &sig).is_ok()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(signer={})", self.signer())
    }
}

#[derive(Serialize, Deserialize)]
struct SignatureRepr {
    public_key: String,
    signature: String,
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        SignatureRepr {
            public_key: hex::encode(self.public_key),
            signature: hex::encode(self.bytes),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = SignatureRepr::deserialize(deserializer)?;
        let mut public_key = [0u8; 32];
        let mut bytes = [0u8; 64];
        hex::decode_to_slice(&repr.public_key, &mut public_key)
            .map_err(serde::de::Error::custom)?;
        hex::decode_to_slice(&repr.signature, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self { public_key, bytes })
    }
}
