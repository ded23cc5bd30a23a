//! Tempo stablecoin wallet primitives.
//!
//! This crate holds everything the subscription engine needs from the wallet
//! without owning any wallet state itself: exact token amounts, addresses and
//! memos, delegated access keys with their signed authorizations, and the
//! collaborator contracts for signing accounts and chain access.
//!
//! # Features
//!
//! - **Exact amounts**: [`Amount`] converts between display units and minor units
//! - **Delegated keys**: [`KeyPair`], [`KeyAuthorization`] and [`AccessAccount`]
//! - **Chain abstraction**: the [`ChainGateway`] trait, implemented in-process by
//!   [`testnet::SimulatedChain`]
//! - **Wallet flows**: [`send_payment`] and [`build_history`]
//!
//! # Example
//!
//! ```rust
//! use tempopay_lib::{Amount, Memo, Token};
//!
//! let token = Token::alpha_usd();
//! let units = token.to_units(&Amount::from_units(24)).unwrap();
//! assert_eq!(units, 24_000_000);
//!
//! let memo = Memo::from_text("StreamWave subscription").unwrap();
//! assert_eq!(memo.to_text(), "StreamWave subscription");
//! ```

pub mod account;
pub mod address;
pub mod amount;
pub mod authorization;
pub mod clock;
pub mod errors;
pub mod gateway;
pub mod history;
pub mod keys;
pub mod memo;
pub mod payment;
pub mod testnet;
pub mod token;

pub use account::{AccessAccount, RootAccount, TransactionSigner};
pub use address::Address;
pub use amount::Amount;
pub use authorization::{DelegatedKey, KeyAuthorization, SignedKeyAuthorization, TokenLimit};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{WalletError, WalletErrorCode, INSUFFICIENT_BALANCE_MARKER};
pub use gateway::{ChainGateway, TokenTransfer, TransactionReceipt, TransferLog, TxHash};
pub use history::{build_history, TransactionRecord, TransferDirection, DEFAULT_HISTORY_LIMIT};
pub use keys::{KeyPair, KeyType, Signature};
pub use memo::{Memo, MEMO_SIZE};
pub use payment::{send_payment, PaymentDraft};
pub use token::{Token, ALPHA_USD_ADDRESS, ALPHA_USD_DECIMALS};

/// Common result alias for wallet operations.
pub type Result<T> = std::result::Result<T, WalletError>;
