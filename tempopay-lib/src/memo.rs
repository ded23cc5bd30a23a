//! Fixed-size transfer memos.
//!
//! The token's `transferWithMemo` takes a `bytes32` memo. Text is UTF-8
//! encoded and left-padded with zero bytes to 32 bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::{Result, WalletError};

/// Size of the on-chain memo field in bytes.
pub const MEMO_SIZE: usize = 32;

/// A 32-byte transfer memo.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memo([u8; MEMO_SIZE]);

impl Memo {
    /// Encode text into a memo.
    ///
    /// # Errors
    ///
    /// Fails if the UTF-8 encoding is longer than 32 bytes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tempopay_lib::Memo;
    /// let memo = Memo::from_text("StreamWave subscription").unwrap();
    /// assert_eq!(memo.to_text(), "StreamWave subscription");
    /// ```
    pub fn from_text(text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        if bytes.len() > MEMO_SIZE {
            return Err(WalletError::invalid_data(
                "memo",
                format!("{} bytes exceeds {} byte limit", bytes.len(), MEMO_SIZE),
            ));
        }
        let mut raw = [0u8; MEMO_SIZE];
        raw[MEMO_SIZE - bytes.len()..].copy_from_slice(bytes);
        Ok(Self(raw))
    }

    /// Wrap raw memo bytes.
    pub fn from_bytes(raw: [u8; MEMO_SIZE]) -> Self {
        Self(raw)
    }

    /// Raw memo bytes.
    pub fn as_bytes(&self) -> &[u8; MEMO_SIZE] {
        &self.0
    }

    /// Decode to text, dropping NUL padding and surrounding whitespace.
    pub fn to_text(&self) -> String {
        let stripped: Vec<u8> = self.0.iter().copied().filter(|b| *b != 0).collect();
        String::from_utf8_lossy(&stripped).trim().to_string()
    }

    /// True if the memo carries no text.
    pub fn is_empty(&self) -> bool {
        self.to_text().is_empty()
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Memo({:?})", self.to_text())
    }
}

impl fmt::Display for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Memo {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Memo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let hex_part = s.strip_prefix("0x").unwrap_or(&s);
        let mut raw = [0u8; MEMO_SIZE];
        hex::decode_to_slice(hex_part, &mut raw).map_err(serde::de::Error::custom)?;
        Ok(Self(raw))
    }
}
