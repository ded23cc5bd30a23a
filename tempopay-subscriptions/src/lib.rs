//! # Tempo Subscriptions
//!
//! Recurring subscriptions paid through delegated access keys.
//!
//! Subscribing to a service mints a local key pair and asks the user's root
//! account to authorize it with a hard expiry and a spend limit worth a fixed
//! number of billing cycles. The engine then pulls each cycle's charge with
//! that key, never the root key.
//!
//! ## Lifecycle
//! - Provisioning authorizes the key, persists it and bills the first cycle
//! - The billing monitor charges every active subscription on each tick
//! - A short balance flags the subscription overdue and retries next tick
//! - Expiry, limit exhaustion, cancellation or an unrecoverable charge
//!   failure delete the persisted record and deactivate the subscription
//!
//! At most one charge per service is ever in flight; see [`ChargeGuard`].

mod billing;
pub mod catalog;
pub mod engine;
pub mod guard;
pub mod monitor;
pub mod observer;
pub mod policy;
pub mod record;
pub mod storage;

pub use billing::{ChargeOutcome, DeactivationReason, SkipReason};
pub use catalog::{Catalog, Service};
pub use engine::SubscriptionEngine;
pub use guard::{ChargeGuard, ChargeLease};
pub use monitor::{BillingMonitor, MonitorHandle};
pub use observer::{BalanceCache, RefresherHandle, WalletObserver};
pub use policy::BillingPolicy;
pub use record::{Subscription, SubscriptionRecord, SubscriptionView};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SubscriptionStore, STORAGE_KEY_PREFIX};

pub type Result<T> = anyhow::Result<T>;

#[derive(thiserror::Error, Debug)]
pub enum SubscriptionError {
    #[error("unknown service: {0}")]
    UnknownService(String),
    #[error("no signing account available")]
    AccountUnavailable,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("arithmetic overflow")]
    Overflow,
}
