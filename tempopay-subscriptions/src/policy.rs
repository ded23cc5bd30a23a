//! Billing policy.
//!
//! Every subscription is bounded three ways at once: a hard expiry on the
//! access key, a spend limit worth `prepaid_cycles` charges, and a count of
//! remaining cycles. Any one of them running out deactivates it.
//!
//! # Environment Variables
//!
//! - `TEMPOPAY_ACCESS_KEY_TTL_SECS` - access key lifetime in seconds (default: 780)
//! - `TEMPOPAY_PREPAID_CYCLES` - cycles covered by the spend limit (default: 12)
//! - `TEMPOPAY_TICK_SECS` - billing tick interval in seconds (default: 10)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tempopay_lib::Token;

fn default_access_key_ttl_secs() -> i64 {
    13 * 60
}

fn default_prepaid_cycles() -> u32 {
    12
}

fn default_tick_interval_secs() -> u64 {
    10
}

/// Parameters of the recurring billing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPolicy {
    /// Lifetime of a freshly authorized access key.
    #[serde(default = "default_access_key_ttl_secs")]
    pub access_key_ttl_secs: i64,
    /// Billing cycles covered by the authorized spend limit.
    #[serde(default = "default_prepaid_cycles")]
    pub prepaid_cycles: u32,
    /// Interval between billing ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Token subscriptions are paid in.
    #[serde(default)]
    pub token: Token,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            access_key_ttl_secs: default_access_key_ttl_secs(),
            prepaid_cycles: default_prepaid_cycles(),
            tick_interval_secs: default_tick_interval_secs(),
            token: Token::default(),
        }
    }
}

impl BillingPolicy {
    pub fn with_access_key_ttl_secs(mut self, secs: i64) -> Self {
        self.access_key_ttl_secs = secs;
        self
    }

    pub fn with_prepaid_cycles(mut self, cycles: u32) -> Self {
        self.prepaid_cycles = cycles;
        self
    }

    pub fn with_tick_interval_secs(mut self, secs: u64) -> Self {
        self.tick_interval_secs = secs;
        self
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.token = token;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }

    /// Load the policy from environment variables, falling back to defaults
    /// for unset or unparsable values.
    pub fn from_env() -> Self {
        let mut policy = Self::default();

        if let Ok(ttl) = std::env::var("TEMPOPAY_ACCESS_KEY_TTL_SECS") {
            if let Ok(secs) = ttl.parse::<i64>() {
                if secs > 0 {
                    policy = policy.with_access_key_ttl_secs(secs);
                }
            }
        }

        if let Ok(cycles) = std::env::var("TEMPOPAY_PREPAID_CYCLES") {
            if let Ok(cycles) = cycles.parse::<u32>() {
                if cycles > 0 {
                    policy = policy.with_prepaid_cycles(cycles);
                }
            }
        }

        if let Ok(tick) = std::env::var("TEMPOPAY_TICK_SECS") {
            if let Ok(secs) = tick.parse::<u64>() {
                policy = policy.with_tick_interval_secs(secs);
            }
        }

        policy
    }
}
