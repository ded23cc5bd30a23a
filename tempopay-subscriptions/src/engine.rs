//! The subscription engine.
//!
//! [`SubscriptionEngine`] owns the live state of every catalog service and is
//! the only writer of subscription records. Every transition for a service
//! runs while holding that service's [`ChargeLease`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tempopay_lib::{ChainGateway, Clock, KeyPair, RootAccount, SystemClock, TokenLimit};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::{
    BillingPolicy, Catalog, ChargeGuard, ChargeLease, ChargeOutcome, DeactivationReason, Result,
    Service, Subscription, SubscriptionError, SubscriptionStore, SubscriptionView, WalletObserver,
};

/// Subscription state machine and billing policy for one wallet session.
pub struct SubscriptionEngine {
    pub(crate) catalog: Catalog,
    pub(crate) policy: BillingPolicy,
    pub(crate) gateway: Arc<dyn ChainGateway>,
    pub(crate) store: SubscriptionStore,
    pub(crate) observer: Arc<dyn WalletObserver>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) guard: Arc<ChargeGuard>,
    root: RwLock<Option<Arc<dyn RootAccount>>>,
    state: Mutex<HashMap<String, Subscription>>,
    views: watch::Sender<Vec<SubscriptionView>>,
}

impl SubscriptionEngine {
    pub fn new(
        catalog: Catalog,
        policy: BillingPolicy,
        gateway: Arc<dyn ChainGateway>,
        store: SubscriptionStore,
        observer: Arc<dyn WalletObserver>,
    ) -> Self {
        let initial = catalog
            .iter()
            .map(|service| SubscriptionView::new(service, None))
            .collect();
        let (views, _) = watch::channel(initial);
        Self {
            catalog,
            policy,
            gateway,
            store,
            observer,
            clock: Arc::new(SystemClock),
            guard: ChargeGuard::new(),
            root: RwLock::new(None),
            state: Mutex::new(HashMap::new()),
            views,
        }
    }

    /// Read time from `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn policy(&self) -> &BillingPolicy {
        &self.policy
    }

    pub fn guard(&self) -> &Arc<ChargeGuard> {
        &self.guard
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Start a session for `root` and restore its persisted subscriptions.
    ///
    /// Returns the number of subscriptions restored.
    pub async fn attach_account(&self, root: Arc<dyn RootAccount>) -> Result<usize> {
        *self.root.write().unwrap_or_else(|e| e.into_inner()) = Some(root);
        self.restore().await
    }

    /// End the session. Persisted records are left alone.
    pub fn detach_account(&self) {
        *self.root.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.publish();
    }

    pub(crate) fn root(&self) -> Option<Arc<dyn RootAccount>> {
        self.root.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Re-derive access keys for every persisted subscription.
    ///
    /// Incomplete records are skipped. Expired or exhausted records and
    /// records whose key can no longer be derived are deleted.
    pub async fn restore(&self) -> Result<usize> {
        let root = self.root().ok_or(SubscriptionError::AccountUnavailable)?;
        let now = self.clock.now_millis();
        let mut restored = 0;

        for service in self.catalog.iter() {
            let _lease = self.guard.acquire(&service.id).await;
            let record = match self.store.load(&service.id).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    error!(service_id = %service.id, error = %e, "failed to read subscription");
                    continue;
                }
            };
            let Some(key_pair) = record.key_pair.as_ref() else {
                continue;
            };
            if record.key_authorization.is_none() {
                continue;
            }

            let amount_units = match self.price_units(service) {
                Ok(units) => units,
                Err(e) => {
                    error!(service_id = %service.id, error = %e, "cannot price service");
                    continue;
                }
            };
            if record.is_expired_at(now) || record.is_exhausted(amount_units) {
                info!(service_id = %service.id, "dropping expired subscription");
                self.discard(&service.id).await;
                continue;
            }

            match root.derive_access_account(key_pair) {
                Ok(access_key) => {
                    self.set_state(&service.id, Subscription::restored(&record, access_key));
                    restored += 1;
                }
                Err(e) => {
                    error!(service_id = %service.id, error = %e, "cannot restore access key");
                    self.discard(&service.id).await;
                }
            }
        }

        self.publish();
        info!(restored, "subscriptions restored");
        Ok(restored)
    }

    /// Drop a record that cannot be restored. A failed delete only affects
    /// this service; the stale record is retried on the next restore.
    async fn discard(&self, service_id: &str) {
        self.deactivate(service_id);
        if let Err(e) = self.store.delete(service_id).await {
            error!(%service_id, error = %e, "failed to delete subscription record");
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Cancel an active subscription or provision an inactive one.
    pub async fn toggle(&self, service_id: &str) -> Result<SubscriptionView> {
        let service = self.catalog.require(service_id)?;
        let lease = self.guard.acquire(service_id).await;
        if self.is_active(service_id) {
            self.teardown(service, &lease, DeactivationReason::Cancelled)
                .await?;
        } else {
            self.provision(service, &lease).await?;
        }
        drop(lease);
        self.view(service_id)
    }

    /// Provision a subscription. A no-op if one is already active.
    pub async fn subscribe(&self, service_id: &str) -> Result<SubscriptionView> {
        let service = self.catalog.require(service_id)?;
        let lease = self.guard.acquire(service_id).await;
        if !self.is_active(service_id) {
            self.provision(service, &lease).await?;
        }
        drop(lease);
        self.view(service_id)
    }

    /// Cancel a subscription. A no-op if none is active.
    pub async fn cancel(&self, service_id: &str) -> Result<SubscriptionView> {
        let service = self.catalog.require(service_id)?;
        let lease = self.guard.acquire(service_id).await;
        if self.is_active(service_id) {
            self.teardown(service, &lease, DeactivationReason::Cancelled)
                .await?;
        }
        drop(lease);
        self.view(service_id)
    }

    /// Authorize a fresh access key, persist it and bill the first cycle.
    ///
    /// Nothing is persisted unless the authorization was signed.
    async fn provision(&self, service: &Service, lease: &ChargeLease) -> Result<ChargeOutcome> {
        let root = self.root().ok_or(SubscriptionError::AccountUnavailable)?;
        if !root.supports_key_authorization() {
            return Err(SubscriptionError::Unsupported(
                "account cannot authorize access keys".into(),
            )
            .into());
        }

        let key_pair = KeyPair::generate();
        let access_key = root.derive_access_account(&key_pair)?;
        let key_id = access_key.delegated_key().key_id;

        let expiry_secs = self.clock.now_secs() + self.policy.access_key_ttl_secs;
        let expires_at = expiry_secs
            .checked_mul(1000)
            .ok_or(SubscriptionError::Overflow)?;
        let amount_units = self.price_units(service)?;
        let limit = amount_units
            .checked_mul(u128::from(self.policy.prepaid_cycles))
            .ok_or(SubscriptionError::Overflow)?;

        let key_authorization = root
            .sign_key_authorization(
                access_key.delegated_key(),
                expiry_secs,
                vec![TokenLimit {
                    token: self.policy.token.address,
                    limit,
                }],
            )
            .await?;

        let subscription = Subscription {
            active: true,
            expires_at,
            remaining_limit: limit,
            charges_remaining: self.policy.prepaid_cycles,
            key_authorized: false,
            overdue: false,
            access_key: Some(Arc::new(access_key)),
            key_authorization: Some(key_authorization),
        };
        let record = subscription
            .to_record()
            .ok_or_else(|| SubscriptionError::InvalidArgument("missing key material".into()))?;
        self.store.save(&service.id, &record).await?;
        self.set_state(&service.id, subscription);
        self.publish();
        info!(
            service_id = %service.id,
            %key_id,
            limit,
            expires_at,
            "subscription provisioned"
        );

        self.charge_locked(service, lease).await
    }

    /// Revoke the access key (best effort) and drop the subscription.
    pub(crate) async fn teardown(
        &self,
        service: &Service,
        _lease: &ChargeLease,
        reason: DeactivationReason,
    ) -> Result<()> {
        if reason == DeactivationReason::Cancelled {
            self.revoke(service).await;
        }

        let deleted = self.store.delete(&service.id).await;
        self.deactivate(&service.id);
        self.publish();
        info!(service_id = %service.id, ?reason, "subscription deactivated");
        deleted
    }

    async fn revoke(&self, service: &Service) {
        let Some(root) = self.root() else {
            warn!(service_id = %service.id, "no account to revoke access key with");
            return;
        };
        let Some(key_id) = self
            .subscription(&service.id)
            .and_then(|s| s.access_key.as_ref().map(|k| k.delegated_key().key_id))
        else {
            return;
        };

        let result = match self.gateway.submit_revoke(root.as_ref(), &key_id).await {
            Ok(hash) => self.gateway.wait_for_confirmation(&hash).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(receipt) => info!(
                service_id = %service.id,
                %key_id,
                tx = %receipt.tx_hash,
                "access key revoked"
            ),
            Err(e) => warn!(
                service_id = %service.id,
                %key_id,
                error = %e,
                "access key revoke failed"
            ),
        }
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub(crate) fn price_units(&self, service: &Service) -> Result<u128> {
        Ok(self.policy.token.to_units(&service.price)?)
    }

    pub(crate) fn subscription(&self, service_id: &str) -> Option<Subscription> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(service_id)
            .cloned()
    }

    pub(crate) fn set_state(&self, service_id: &str, subscription: Subscription) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(service_id.to_string(), subscription);
    }

    pub(crate) fn deactivate(&self, service_id: &str) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(service_id);
    }

    pub fn is_active(&self, service_id: &str) -> bool {
        self.subscription(service_id).is_some_and(|s| s.active)
    }

    /// Current state of one service.
    pub fn view(&self, service_id: &str) -> Result<SubscriptionView> {
        let service = self.catalog.require(service_id)?;
        Ok(SubscriptionView::new(
            service,
            self.subscription(service_id).as_ref(),
        ))
    }

    /// Current state of every service, in catalog order.
    pub fn views(&self) -> Vec<SubscriptionView> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.catalog
            .iter()
            .map(|service| SubscriptionView::new(service, state.get(&service.id)))
            .collect()
    }

    /// Active services first, catalog order otherwise.
    pub fn list_services_sorted_active_first(&self) -> Vec<SubscriptionView> {
        let mut views = self.views();
        views.sort_by_key(|view| !view.active);
        views
    }

    /// Receive the full view list after every change.
    pub fn watch(&self) -> watch::Receiver<Vec<SubscriptionView>> {
        self.views.subscribe()
    }

    pub(crate) fn publish(&self) {
        self.views.send_replace(self.views());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BalanceCache, MemoryStore};
    use tempopay_lib::testnet::{LocalRootAccount, SimulatedChain};
    use tempopay_lib::{Amount, ManualClock, Token};

    fn engine() -> (SubscriptionEngine, Arc<SimulatedChain>, Arc<LocalRootAccount>) {
        let clock = Arc::new(ManualClock::new(1_800_000_000_000));
        let chain = SimulatedChain::with_clock(clock.clone());
        let root = Arc::new(LocalRootAccount::generate());
        chain.fund(&Token::alpha_usd().address, &root.address(), 100_000_000);
        let engine = SubscriptionEngine::new(
            Catalog::demo(),
            BillingPolicy::default(),
            chain.clone(),
            SubscriptionStore::new(Arc::new(MemoryStore::new())),
            Arc::new(BalanceCache::new(Some(Amount::from_units(100)))),
        )
        .with_clock(clock);
        (engine, chain, root)
    }

    #[tokio::test]
    async fn test_sort_active_first_is_stable() {
        let (engine, _chain, root) = engine();
        engine.attach_account(root).await.unwrap();
        engine.subscribe("spark").await.unwrap();

        let order: Vec<_> = engine
            .list_services_sorted_active_first()
            .into_iter()
            .map(|v| v.service_id)
            .collect();
        assert_eq!(order, ["spark", "streamwave", "echo", "north"]);
    }

    #[tokio::test]
    async fn test_provision_requires_account() {
        let (engine, _chain, _root) = engine();
        let err = engine.subscribe("echo").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SubscriptionError>(),
            Some(SubscriptionError::AccountUnavailable)
        ));
        assert!(!engine.is_active("echo"));
    }

    #[tokio::test]
    async fn test_provision_requires_delegation_capability() {
        let (engine, chain, _root) = engine();
        let plain = Arc::new(LocalRootAccount::generate().without_delegation());
        chain.fund(&Token::alpha_usd().address, &plain.address(), 100_000_000);
        engine.attach_account(plain).await.unwrap();

        let err = engine.toggle("echo").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SubscriptionError>(),
            Some(SubscriptionError::Unsupported(_))
        ));
        assert!(!engine.is_active("echo"));
        assert_eq!(chain.transfer_attempts(), 0);
    }

    #[tokio::test]
    async fn test_watch_sees_transitions() {
        let (engine, _chain, root) = engine();
        engine.attach_account(root).await.unwrap();
        let mut rx = engine.watch();
        rx.borrow_and_update();

        engine.toggle("north").await.unwrap();
        assert!(rx.has_changed().unwrap());
        let views = rx.borrow_and_update().clone();
        assert!(views.iter().any(|v| v.service_id == "north" && v.active));

        engine.toggle("north").await.unwrap();
        assert!(!rx.borrow().iter().any(|v| v.active));
    }

    #[tokio::test]
    async fn test_unknown_service_is_rejected() {
        let (engine, _chain, root) = engine();
        engine.attach_account(root).await.unwrap();
        assert!(engine.toggle("nope").await.is_err());
        assert!(engine.view("nope").is_err());
    }

    #[tokio::test]
    async fn test_detach_clears_memory_only() {
        let (engine, _chain, root) = engine();
        engine.attach_account(root.clone()).await.unwrap();
        engine.subscribe("echo").await.unwrap();

        engine.detach_account();
        assert!(!engine.is_active("echo"));

        assert_eq!(engine.attach_account(root).await.unwrap(), 1);
        assert!(engine.is_active("echo"));
    }
}
