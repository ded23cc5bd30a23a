//! Wallet state the engine reads and pokes.
//!
//! The engine only needs the last known balance for its pre-flight check and
//! a way to say "a transfer happened, refresh". Hosts either load the
//! balance themselves or run [`BalanceCache::spawn_refresher`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempopay_lib::{Address, Amount, ChainGateway, Token};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Balance and activity collaborator.
pub trait WalletObserver: Send + Sync {
    /// Last known balance in whole units. `None` while unknown, in which case
    /// the engine skips its balance pre-check.
    fn balance(&self) -> Option<Amount>;

    /// Fire-and-forget request to reload the activity feed.
    fn request_history_refresh(&self);

    /// Fire-and-forget request to reload the balance.
    fn request_balance_refresh(&self);
}

/// Shared balance cache the host keeps up to date.
#[derive(Debug)]
pub struct BalanceCache {
    balance: watch::Sender<Option<Amount>>,
    history_refreshes: AtomicUsize,
    balance_refreshes: AtomicUsize,
    refresh_requested: Notify,
}

impl Default for BalanceCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl BalanceCache {
    pub fn new(initial: Option<Amount>) -> Self {
        let (balance, _) = watch::channel(initial);
        Self {
            balance,
            history_refreshes: AtomicUsize::new(0),
            balance_refreshes: AtomicUsize::new(0),
            refresh_requested: Notify::new(),
        }
    }

    pub fn set_balance(&self, balance: Option<Amount>) {
        self.balance.send_replace(balance);
    }

    /// Reload the balance from the chain.
    pub async fn refresh_from(
        &self,
        gateway: &dyn ChainGateway,
        token: &Token,
        owner: &Address,
    ) -> tempopay_lib::Result<Amount> {
        let units = gateway.balance_of(&token.address, owner).await?;
        let amount = token.to_amount(units)?;
        self.set_balance(Some(amount));
        Ok(amount)
    }

    /// Balance updates as they arrive.
    pub fn subscribe(&self) -> watch::Receiver<Option<Amount>> {
        self.balance.subscribe()
    }

    /// Resolves once a refresh has been requested since the last time it
    /// resolved.
    pub async fn refresh_requested(&self) {
        self.refresh_requested.notified().await;
    }

    /// Reload the balance every `period` and whenever the engine requests it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_refresher(
        self: &Arc<Self>,
        gateway: Arc<dyn ChainGateway>,
        token: Token,
        owner: Address,
        period: Duration,
    ) -> RefresherHandle {
        let (stop, mut stop_rx) = watch::channel(false);
        let cache = self.clone();

        let task = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = timer.tick() => {}
                    _ = cache.refresh_requested() => {}
                    _ = stop_rx.changed() => break,
                }
                match cache.refresh_from(gateway.as_ref(), &token, &owner).await {
                    Ok(balance) => tracing::debug!(%balance, "balance refreshed"),
                    Err(e) => tracing::warn!(error = %e, "balance refresh failed"),
                }
            }
        });

        RefresherHandle { stop, task }
    }

    pub fn history_refreshes(&self) -> usize {
        self.history_refreshes.load(Ordering::SeqCst)
    }

    pub fn balance_refreshes(&self) -> usize {
        self.balance_refreshes.load(Ordering::SeqCst)
    }
}

impl WalletObserver for BalanceCache {
    fn balance(&self) -> Option<Amount> {
        *self.balance.borrow()
    }

    fn request_history_refresh(&self) {
        self.history_refreshes.fetch_add(1, Ordering::SeqCst);
        self.refresh_requested.notify_one();
    }

    fn request_balance_refresh(&self) {
        self.balance_refreshes.fetch_add(1, Ordering::SeqCst);
        self.refresh_requested.notify_one();
    }
}

/// Handle to a running balance refresher. Dropping it also stops the task.
pub struct RefresherHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefresherHandle {
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempopay_lib::testnet::{LocalRootAccount, SimulatedChain};

    #[test]
    fn test_unknown_balance_by_default() {
        let cache = BalanceCache::default();
        assert_eq!(cache.balance(), None);

        cache.set_balance(Some(Amount::from_units(100)));
        assert_eq!(cache.balance(), Some(Amount::from_units(100)));
    }

    #[test]
    fn test_refresh_counters() {
        let cache = BalanceCache::default();
        cache.request_history_refresh();
        cache.request_balance_refresh();
        cache.request_balance_refresh();
        assert_eq!(cache.history_refreshes(), 1);
        assert_eq!(cache.balance_refreshes(), 2);
    }

    #[tokio::test]
    async fn test_refresh_from_chain() {
        let chain = SimulatedChain::new();
        let root = LocalRootAccount::generate();
        let token = Token::alpha_usd();
        chain.fund(&token.address, &root.address(), 76_500_000);

        let cache = BalanceCache::default();
        let mut updates = cache.subscribe();
        let amount = cache
            .refresh_from(chain.as_ref(), &token, &root.address())
            .await
            .unwrap();

        assert_eq!(amount.format_balance(), "76.50");
        assert!(updates.has_changed().unwrap());
        assert_eq!(*updates.borrow_and_update(), Some(amount));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresher_tracks_chain_balance() {
        let chain = SimulatedChain::new();
        let root = LocalRootAccount::generate();
        let token = Token::alpha_usd();
        chain.fund(&token.address, &root.address(), 100_000_000);

        let cache = Arc::new(BalanceCache::new(Some(Amount::from_units(100))));
        let refresher = cache.spawn_refresher(
            chain.clone(),
            token,
            root.address(),
            Duration::from_secs(10),
        );

        // Periodic reload.
        chain.set_balance(&token.address, &root.address(), 5_000_000);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(cache.balance(), Some(Amount::from_units(5)));

        // Reload on request, well before the next period.
        chain.set_balance(&token.address, &root.address(), 1_000_000);
        cache.request_balance_refresh();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(cache.balance(), Some(Amount::from_units(1)));

        refresher.stop().await;
        chain.set_balance(&token.address, &root.address(), 9_000_000);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(cache.balance(), Some(Amount::from_units(1)));
    }
}
