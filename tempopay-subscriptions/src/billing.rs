//! Charging and the billing tick.
//!
//! A charge pulls one cycle's price from the root account using the
//! subscription's access key. The first transfer made with a key has to carry
//! its authorization so the chain can register the key; later transfers must
//! not. When the local `key_authorized` flag disagrees with the chain the
//! transfer is retried once with the opposite choice.

use serde::{Deserialize, Serialize};
use tempopay_lib::{
    AccessAccount, Memo, SignedKeyAuthorization, TokenTransfer, TransactionReceipt, WalletError,
    MEMO_SIZE,
};
use tracing::{debug, error, info, warn};

use crate::{ChargeLease, Result, Service, Subscription, SubscriptionEngine, SubscriptionError};

/// What a charge attempt did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeOutcome {
    /// One cycle was billed and the subscription continues.
    Charged {
        remaining_limit: u128,
        charges_remaining: u32,
    },
    /// The last prepaid cycle was billed; the subscription has ended.
    Completed,
    /// The balance is short. Nothing was charged; retried next tick.
    Overdue,
    Skipped(SkipReason),
    /// Another charge for the same service is still running.
    InFlight,
    Deactivated(DeactivationReason),
    /// The step failed before reaching a decision; state is unchanged.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// No active subscription.
    Inactive,
    /// Key material not loaded for this session.
    NotLoaded,
    /// The next charge does not fit the remaining limit or count.
    LimitReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeactivationReason {
    Expired,
    Exhausted,
    /// The transfer failed on both attempts.
    ChargeFailed,
    Cancelled,
}

/// Memo attached to a charge, truncated to the memo field.
fn charge_memo(service: &Service) -> Memo {
    let mut text = service.charge_memo();
    while text.len() > MEMO_SIZE {
        text.pop();
    }
    Memo::from_text(&text).unwrap_or_else(|_| Memo::from_bytes([0; MEMO_SIZE]))
}

impl SubscriptionEngine {
    /// Charge one service now, unless a charge for it is already running.
    pub async fn charge(&self, service_id: &str) -> Result<ChargeOutcome> {
        let service = self.catalog.require(service_id)?;
        let Some(lease) = self.guard.try_acquire(service_id) else {
            return Ok(ChargeOutcome::InFlight);
        };
        self.charge_locked(service, &lease).await
    }

    /// Run one billing pass over every active subscription.
    ///
    /// Expired and exhausted subscriptions are torn down without a transfer;
    /// the rest are charged. Services with a charge still in flight are
    /// skipped. A failure for one service is logged and never affects the
    /// others.
    pub async fn tick(&self) -> Vec<(String, ChargeOutcome)> {
        let now = self.clock.now_millis();
        let mut outcomes = Vec::new();

        for service in self.catalog.iter() {
            if !self.is_active(&service.id) {
                continue;
            }
            let Some(lease) = self.guard.try_acquire(&service.id) else {
                debug!(service_id = %service.id, "charge in flight, skipping tick");
                outcomes.push((service.id.clone(), ChargeOutcome::InFlight));
                continue;
            };

            let outcome = match self.tick_service(service, &lease, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(service_id = %service.id, error = %e, "billing step failed");
                    ChargeOutcome::Failed(e.to_string())
                }
            };
            drop(lease);
            outcomes.push((service.id.clone(), outcome));
        }

        outcomes
    }

    async fn tick_service(
        &self,
        service: &Service,
        lease: &ChargeLease,
        now: i64,
    ) -> Result<ChargeOutcome> {
        // Re-read under the lease: a cancel may have won the race.
        let Some(subscription) = self.subscription(&service.id).filter(|s| s.active) else {
            return Ok(ChargeOutcome::Skipped(SkipReason::Inactive));
        };

        let reason = if subscription.is_expired_at(now) {
            Some(DeactivationReason::Expired)
        } else if subscription.is_exhausted(self.price_units(service)?) {
            Some(DeactivationReason::Exhausted)
        } else {
            None
        };
        if let Some(reason) = reason {
            self.teardown(service, lease, reason).await?;
            return Ok(ChargeOutcome::Deactivated(reason));
        }

        self.charge_locked(service, lease).await
    }

    /// Charge algorithm proper. The caller holds the service's lease.
    #[tracing::instrument(skip_all, fields(service_id = %service.id))]
    pub(crate) async fn charge_locked(
        &self,
        service: &Service,
        lease: &ChargeLease,
    ) -> Result<ChargeOutcome> {
        let Some(subscription) = self.subscription(&service.id).filter(|s| s.active) else {
            return Ok(ChargeOutcome::Skipped(SkipReason::Inactive));
        };
        let (Some(access_key), Some(authorization)) = (
            subscription.access_key.clone(),
            subscription.key_authorization.clone(),
        ) else {
            return Ok(ChargeOutcome::Skipped(SkipReason::NotLoaded));
        };

        // Advisory pre-flight check against the last known balance.
        if let Some(balance) = self.observer.balance() {
            if balance < service.price {
                return self.mark_overdue(service, subscription).await;
            }
        }

        let amount_units = self.price_units(service)?;
        if subscription.is_exhausted(amount_units) {
            return Ok(ChargeOutcome::Skipped(SkipReason::LimitReached));
        }

        let transfer = TokenTransfer::new(self.policy.token.address, service.payee, amount_units)
            .with_memo(charge_memo(service));
        let attach = !subscription.key_authorized;

        let first_error = match self
            .submit_charge(&access_key, &transfer, &authorization, attach)
            .await
        {
            Ok(receipt) => {
                return self
                    .record_charge(service, subscription, amount_units, &receipt)
                    .await
            }
            Err(e) => e,
        };

        if first_error.is_insufficient_balance() {
            return self.mark_overdue(service, subscription).await;
        }

        warn!(
            error = %first_error,
            attach_authorization = !attach,
            "charge failed, retrying"
        );
        match self
            .submit_charge(&access_key, &transfer, &authorization, !attach)
            .await
        {
            Ok(receipt) => {
                self.record_charge(service, subscription, amount_units, &receipt)
                    .await
            }
            Err(e) => {
                error!(error = %e, "charge failed twice, deactivating subscription");
                self.teardown(service, lease, DeactivationReason::ChargeFailed)
                    .await?;
                Ok(ChargeOutcome::Deactivated(DeactivationReason::ChargeFailed))
            }
        }
    }

    async fn submit_charge(
        &self,
        access_key: &AccessAccount,
        transfer: &TokenTransfer,
        authorization: &SignedKeyAuthorization,
        attach_authorization: bool,
    ) -> tempopay_lib::Result<TransactionReceipt> {
        let transfer = if attach_authorization {
            transfer.clone().with_key_authorization(authorization.clone())
        } else {
            transfer.clone()
        };
        let submitted = self.gateway.submit_transfer(access_key, &transfer).await?;
        let receipt = self
            .gateway
            .wait_for_confirmation(&submitted.tx_hash)
            .await?;
        if !receipt.success {
            return Err(WalletError::Transport(format!(
                "transaction {} reverted",
                receipt.tx_hash
            )));
        }
        Ok(receipt)
    }

    async fn record_charge(
        &self,
        service: &Service,
        subscription: Subscription,
        amount_units: u128,
        receipt: &TransactionReceipt,
    ) -> Result<ChargeOutcome> {
        let remaining_limit = subscription
            .remaining_limit
            .checked_sub(amount_units)
            .ok_or(SubscriptionError::Overflow)?;
        let charges_remaining = subscription.charges_remaining.saturating_sub(1);

        if charges_remaining == 0 {
            let deleted = self.store.delete(&service.id).await;
            self.deactivate(&service.id);
            self.publish();
            self.observer.request_history_refresh();
            self.observer.request_balance_refresh();
            info!(tx = %receipt.tx_hash, "final cycle charged, subscription complete");
            deleted?;
            return Ok(ChargeOutcome::Completed);
        }

        let updated = Subscription {
            remaining_limit,
            charges_remaining,
            key_authorized: true,
            overdue: false,
            ..subscription
        };
        let record = updated
            .to_record()
            .ok_or_else(|| SubscriptionError::InvalidArgument("missing key material".into()))?;
        // The transfer is final, so memory follows it even if the write fails.
        let saved = self.store.save(&service.id, &record).await;
        self.set_state(&service.id, updated);
        self.publish();
        self.observer.request_history_refresh();
        self.observer.request_balance_refresh();
        info!(
            tx = %receipt.tx_hash,
            remaining_limit,
            charges_remaining,
            "subscription charged"
        );
        saved?;

        Ok(ChargeOutcome::Charged {
            remaining_limit,
            charges_remaining,
        })
    }

    async fn mark_overdue(
        &self,
        service: &Service,
        subscription: Subscription,
    ) -> Result<ChargeOutcome> {
        let updated = Subscription {
            overdue: true,
            ..subscription
        };
        let record = updated
            .to_record()
            .ok_or_else(|| SubscriptionError::InvalidArgument("missing key material".into()))?;
        self.store.save(&service.id, &record).await?;
        self.set_state(&service.id, updated);
        self.publish();
        warn!(service_id = %service.id, price = %service.price, "balance too low, subscription overdue");
        Ok(ChargeOutcome::Overdue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempopay_lib::{Address, Amount};

    #[test]
    fn test_charge_memo_fits_field() {
        let short = Service::new("n", "NorthShield", "", Amount::from_units(14), Address::ZERO);
        assert_eq!(charge_memo(&short).to_text(), "NorthShield subscription");

        let long = Service::new(
            "l",
            "An Extraordinarily Long Service Name",
            "",
            Amount::from_units(1),
            Address::ZERO,
        );
        let memo = charge_memo(&long).to_text();
        assert!(memo.len() <= MEMO_SIZE);
        assert!(memo.starts_with("An Extraordinarily"));
    }
}
