//! Subscription state: the persisted record, the in-memory entry and the
//! read-only view handed to hosts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tempopay_lib::{AccessAccount, Amount, KeyPair, SignedKeyAuthorization};

use crate::Service;

/// Durable record stored under `"subscription:" + service_id`.
///
/// # Storage format
///
/// JSON object. `expires_at` is milliseconds since the Unix epoch and
/// `remaining_limit` is in the token's minor units. Records written before
/// the charge-tracking flags existed lack `key_authorized` and `overdue`;
/// both default to `false` here and nowhere else. A record without
/// `key_pair` or `key_authorization` is incomplete and never restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub expires_at: i64,
    pub remaining_limit: u128,
    pub charges_remaining: u32,
    #[serde(default)]
    pub key_authorized: bool,
    #[serde(default)]
    pub overdue: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_authorization: Option<SignedKeyAuthorization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pair: Option<KeyPair>,
}

impl SubscriptionRecord {
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.expires_at <= now_millis
    }

    /// No further charge of `amount_units` fits.
    pub fn is_exhausted(&self, amount_units: u128) -> bool {
        self.charges_remaining == 0 || self.remaining_limit < amount_units
    }
}

/// Live subscription held by the engine for one service.
#[derive(Debug, Clone, Default)]
pub struct Subscription {
    pub active: bool,
    pub expires_at: i64,
    pub remaining_limit: u128,
    pub charges_remaining: u32,
    pub key_authorized: bool,
    pub overdue: bool,
    /// Session-only; re-derived from the persisted key pair on restore.
    pub access_key: Option<Arc<AccessAccount>>,
    pub key_authorization: Option<SignedKeyAuthorization>,
}

impl Subscription {
    /// Build an active entry from a persisted record and a derived key.
    pub fn restored(record: &SubscriptionRecord, access_key: AccessAccount) -> Self {
        Self {
            active: true,
            expires_at: record.expires_at,
            remaining_limit: record.remaining_limit,
            charges_remaining: record.charges_remaining,
            key_authorized: record.key_authorized,
            overdue: record.overdue,
            access_key: Some(Arc::new(access_key)),
            key_authorization: record.key_authorization.clone(),
        }
    }

    /// The record that persists this entry, if its key material is loaded.
    pub fn to_record(&self) -> Option<SubscriptionRecord> {
        let access_key = self.access_key.as_ref()?;
        let key_authorization = self.key_authorization.clone()?;
        Some(SubscriptionRecord {
            expires_at: self.expires_at,
            remaining_limit: self.remaining_limit,
            charges_remaining: self.charges_remaining,
            key_authorized: self.key_authorized,
            overdue: self.overdue,
            key_authorization: Some(key_authorization),
            key_pair: Some(access_key.key_pair().clone()),
        })
    }

    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.expires_at <= now_millis
    }

    pub fn is_exhausted(&self, amount_units: u128) -> bool {
        self.charges_remaining == 0 || self.remaining_limit < amount_units
    }
}

/// What a host renders for one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionView {
    pub service_id: String,
    pub name: String,
    pub description: String,
    pub price: Amount,
    pub active: bool,
    pub overdue: bool,
    /// Milliseconds since the Unix epoch; `None` when inactive.
    pub expires_at: Option<i64>,
    /// Minor units.
    pub remaining_limit: u128,
    pub charges_remaining: u32,
    pub key_authorized: bool,
}

impl SubscriptionView {
    pub(crate) fn new(service: &Service, subscription: Option<&Subscription>) -> Self {
        let live = subscription.filter(|s| s.active);
        Self {
            service_id: service.id.clone(),
            name: service.name.clone(),
            description: service.description.clone(),
            price: service.price,
            active: live.is_some(),
            overdue: live.is_some_and(|s| s.overdue),
            expires_at: live.map(|s| s.expires_at),
            remaining_limit: live.map_or(0, |s| s.remaining_limit),
            charges_remaining: live.map_or(0, |s| s.charges_remaining),
            key_authorized: live.is_some_and(|s| s.key_authorized),
        }
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at.and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_record_defaults_flags() {
        let json = r#"{"expires_at": 1800000780000, "remaining_limit": 264000000, "charges_remaining": 11}"#;
        let record: SubscriptionRecord = serde_json::from_str(json).unwrap();
        assert!(!record.key_authorized);
        assert!(!record.overdue);
        assert!(record.key_pair.is_none());
        assert!(record.key_authorization.is_none());
    }

    #[test]
    fn test_exhaustion_checks() {
        let record = SubscriptionRecord {
            expires_at: 1_000,
            remaining_limit: 24,
            charges_remaining: 1,
            key_authorized: true,
            overdue: false,
            key_authorization: None,
            key_pair: None,
        };
        assert!(record.is_expired_at(1_000));
        assert!(!record.is_expired_at(999));
        assert!(!record.is_exhausted(24));
        assert!(record.is_exhausted(25));

        let done = SubscriptionRecord {
            charges_remaining: 0,
            ..record
        };
        assert!(done.is_exhausted(1));
    }

    #[test]
    fn test_inactive_view_hides_stale_fields() {
        let service = crate::Catalog::demo().get("north").unwrap().clone();
        let stale = Subscription {
            active: false,
            charges_remaining: 4,
            overdue: true,
            ..Default::default()
        };
        let view = SubscriptionView::new(&service, Some(&stale));
        assert!(!view.active);
        assert!(!view.overdue);
        assert_eq!(view.charges_remaining, 0);
        assert_eq!(view.expires_at, None);
    }
}
