//! Error types for wallet operations.
//!
//! Chain collaborators report failures through [`WalletError`]. The
//! subscription engine relies on [`WalletError::is_insufficient_balance`] to
//! tell a recoverable short balance apart from every other failure.

use std::fmt;

/// Marker the chain uses when a transfer exceeds the sender's balance.
pub const INSUFFICIENT_BALANCE_MARKER: &str = "InsufficientBalance";

/// Error codes for FFI and host integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum WalletErrorCode {
    /// Transport/RPC layer error
    Transport = 2000,
    /// Account cannot perform the requested operation
    Unsupported = 3000,
    /// Signing failed
    Signing = 3001,
    /// Delegated key rejected by the chain
    KeyRejected = 3002,
    /// Resource not found
    NotFound = 4000,
    /// Invalid request/data
    InvalidData = 5000,
    /// Serialization error
    Serialization = 5002,
    /// Insufficient token balance
    InsufficientBalance = 6001,
    /// Spending limit of a delegated key exceeded
    SpendLimitExceeded = 6002,
    /// Storage error
    Storage = 7000,
}

/// Error type for wallet and chain operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Transport or RPC error reported by the network.
    Transport(String),

    /// The account lacks a capability (e.g. key authorization signing).
    Unsupported(String),

    /// Producing a signature failed.
    Signing(String),

    /// The chain rejected the delegated key used to sign.
    KeyRejected {
        /// Delegated key id
        key_id: String,
        /// Rejection reason
        reason: String,
    },

    /// Resource not found.
    NotFound {
        /// Type of resource (e.g. "transaction", "account")
        resource_type: String,
        /// Resource identifier
        identifier: String,
    },

    /// Invalid data provided.
    InvalidData {
        /// Field or parameter name
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Serialization/deserialization error.
    Serialization(String),

    /// Sender balance is below the transfer amount.
    InsufficientBalance {
        /// Required amount in minor units
        required: u128,
        /// Available amount in minor units
        available: u128,
    },

    /// The transfer would exceed the delegated key's remaining limit.
    SpendLimitExceeded {
        /// Delegated key id
        key_id: String,
        /// Requested amount in minor units
        requested: u128,
        /// Remaining limit in minor units
        remaining: u128,
    },

    /// Storage operation failed.
    Storage(String),
}

impl WalletError {
    /// Get the error code.
    pub fn code(&self) -> WalletErrorCode {
        match self {
            Self::Transport(_) => WalletErrorCode::Transport,
            Self::Unsupported(_) => WalletErrorCode::Unsupported,
            Self::Signing(_) => WalletErrorCode::Signing,
            Self::KeyRejected { .. } => WalletErrorCode::KeyRejected,
            Self::NotFound { .. } => WalletErrorCode::NotFound,
            Self::InvalidData { .. } => WalletErrorCode::InvalidData,
            Self::Serialization(_) => WalletErrorCode::Serialization,
            Self::InsufficientBalance { .. } => WalletErrorCode::InsufficientBalance,
            Self::SpendLimitExceeded { .. } => WalletErrorCode::SpendLimitExceeded,
            Self::Storage(_) => WalletErrorCode::Storage,
        }
    }

    /// Returns true if the failure is the sender's balance being too low.
    ///
    /// RPC backends usually surface this as a generic error whose message
    /// names the revert reason, so transport errors are matched by marker.
    pub fn is_insufficient_balance(&self) -> bool {
        match self {
            Self::InsufficientBalance { .. } => true,
            Self::Transport(msg) => msg.contains(INSUFFICIENT_BALANCE_MARKER),
            _ => false,
        }
    }

    /// Create a not found error.
    pub fn not_found(resource_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a key rejection error.
    pub fn key_rejected(key_id: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::KeyRejected {
            key_id: key_id.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::Unsupported(msg) => write!(f, "unsupported: {}", msg),
            Self::Signing(msg) => write!(f, "signing failed: {}", msg),
            Self::KeyRejected { key_id, reason } => {
                write!(f, "access key {} rejected: {}", key_id, reason)
            }
            Self::NotFound {
                resource_type,
                identifier,
            } => write!(f, "{} not found: {}", resource_type, identifier),
            Self::InvalidData { field, reason } => write!(f, "invalid {}: {}", field, reason),
            Self::Serialization(msg) => write!(f, "serialization error: {}", msg),
            Self::InsufficientBalance {
                required,
                available,
            } => write!(
                f,
                "{}: need {} units, have {} units",
                INSUFFICIENT_BALANCE_MARKER, required, available
            ),
            Self::SpendLimitExceeded {
                key_id,
                requested,
                remaining,
            } => write!(
                f,
                "spend limit exceeded for key {}: requested {}, remaining {}",
                key_id, requested, remaining
            ),
            Self::Storage(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
