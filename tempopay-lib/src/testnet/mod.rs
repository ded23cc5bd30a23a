//! In-process testnet.
//!
//! [`SimulatedChain`] implements [`crate::ChainGateway`] against an in-memory
//! ledger with the delegated-key rules of the Tempo account keychain, and
//! [`LocalRootAccount`] stands in for the passkey-backed root account. The
//! demo CLI runs on them and the test suites use their fault-injection hooks.
//!
//! # Example
//!
//! ```rust
//! use tempopay_lib::testnet::{LocalRootAccount, SimulatedChain};
//! use tempopay_lib::{Amount, Token};
//!
//! let chain = SimulatedChain::new();
//! let alice = LocalRootAccount::generate();
//! let token = Token::alpha_usd();
//! chain.fund(&token.address, &alice.address(), token.to_units(&Amount::from_units(100)).unwrap());
//! assert_eq!(chain.balance(&token.address, &alice.address()), 100_000_000);
//! ```

mod account;
mod chain;

pub use account::LocalRootAccount;
pub use chain::SimulatedChain;
