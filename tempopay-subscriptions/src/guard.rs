//! Per-service mutual exclusion for charges and state transitions.
//!
//! A [`ChargeLease`] marks its service as busy until it is dropped, so the
//! busy flag is released on every exit path. Billing ticks use
//! [`ChargeGuard::try_acquire`] and skip busy services; user actions use
//! [`ChargeGuard::acquire`] and wait for the in-flight charge to finish.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Set of service ids with a charge or transition in flight.
#[derive(Debug, Default)]
pub struct ChargeGuard {
    charging: Mutex<HashSet<String>>,
    released: Notify,
}

impl ChargeGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark `service_id` busy, or return `None` if it already is.
    pub fn try_acquire(self: &Arc<Self>, service_id: &str) -> Option<ChargeLease> {
        let mut charging = self.charging.lock().unwrap_or_else(|e| e.into_inner());
        if !charging.insert(service_id.to_string()) {
            return None;
        }
        Some(ChargeLease {
            guard: Arc::clone(self),
            service_id: service_id.to_string(),
        })
    }

    /// Wait until `service_id` is free, then mark it busy.
    pub async fn acquire(self: &Arc<Self>, service_id: &str) -> ChargeLease {
        loop {
            let mut released = std::pin::pin!(self.released.notified());
            // Register before checking so a release in between is not missed.
            released.as_mut().enable();
            if let Some(lease) = self.try_acquire(service_id) {
                return lease;
            }
            released.await;
        }
    }

    pub fn is_charging(&self, service_id: &str) -> bool {
        self.charging
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(service_id)
    }

    fn release(&self, service_id: &str) {
        self.charging
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(service_id);
        self.released.notify_waiters();
    }
}

/// Proof that a service is held busy. Dropping it releases the service.
#[derive(Debug)]
pub struct ChargeLease {
    guard: Arc<ChargeGuard>,
    service_id: String,
}

impl ChargeLease {
    pub fn service_id(&self) -> &str {
        &self.service_id
    }
}

impl Drop for ChargeLease {
    fn drop(&mut self) {
        self.guard.release(&self.service_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_try_acquire_is_exclusive_per_service() {
        let guard = ChargeGuard::new();
        let lease = guard.try_acquire("echo").unwrap();
        assert!(guard.is_charging("echo"));
        assert!(guard.try_acquire("echo").is_none());

        // Other services are independent
        let other = guard.try_acquire("spark");
        assert!(other.is_some());

        drop(lease);
        assert!(!guard.is_charging("echo"));
        assert!(guard.try_acquire("echo").is_some());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let guard = ChargeGuard::new();
        let lease = guard.try_acquire("north").unwrap();

        let waiter = {
            let guard = guard.clone();
            tokio::spawn(async move {
                let lease = guard.acquire("north").await;
                lease.service_id().to_string()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(lease);
        let id = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id, "north");
        assert!(!guard.is_charging("north"));
    }
}
