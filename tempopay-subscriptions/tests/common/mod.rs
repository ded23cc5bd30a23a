//! Shared fixture: an engine wired to a simulated chain on a manual clock.

#![allow(dead_code)]

use std::sync::Arc;
use tempopay_lib::testnet::{LocalRootAccount, SimulatedChain};
use tempopay_lib::{Amount, ManualClock, Token};
use tempopay_subscriptions::{
    BalanceCache, BillingPolicy, Catalog, MemoryStore, SubscriptionEngine, SubscriptionStore,
};

pub const START_MILLIS: i64 = 1_800_000_000_000;

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub chain: Arc<SimulatedChain>,
    pub root: Arc<LocalRootAccount>,
    pub cache: Arc<BalanceCache>,
    pub memory: Arc<MemoryStore>,
    pub engine: Arc<SubscriptionEngine>,
    pub token: Token,
}

impl Harness {
    /// Fund the root account with `balance` whole units and attach it.
    pub async fn new(balance: i64) -> Self {
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let chain = SimulatedChain::with_clock(clock.clone());
        let root = Arc::new(LocalRootAccount::generate());
        let token = Token::alpha_usd();
        chain.fund(&token.address, &root.address(), units(balance));

        let memory = Arc::new(MemoryStore::new());
        let cache = Arc::new(BalanceCache::default());
        let engine = build_engine(&clock, &chain, &memory, &cache);

        let harness = Self {
            clock,
            chain,
            root,
            cache,
            memory,
            engine,
            token,
        };
        harness.sync_balance().await;
        harness
            .engine
            .attach_account(harness.root.clone())
            .await
            .unwrap();
        harness
    }

    /// A fresh engine over the same store, chain and account.
    pub async fn reload(&self) -> Arc<SubscriptionEngine> {
        let engine = build_engine(&self.clock, &self.chain, &self.memory, &self.cache);
        engine.attach_account(self.root.clone()).await.unwrap();
        engine
    }

    /// Copy the on-chain balance into the cache the engine reads.
    pub async fn sync_balance(&self) -> Amount {
        self.cache
            .refresh_from(self.chain.as_ref(), &self.token, &self.root.address())
            .await
            .unwrap()
    }

    /// Overwrite the on-chain balance and refresh the cache.
    pub async fn set_balance(&self, whole_units: i64) {
        self.chain
            .set_balance(&self.token.address, &self.root.address(), units(whole_units));
        self.sync_balance().await;
    }

    pub fn balance_units(&self) -> u128 {
        self.chain.balance(&self.token.address, &self.root.address())
    }

    pub fn payee_units(&self, service_id: &str) -> u128 {
        let payee = self.engine.catalog().get(service_id).unwrap().payee;
        self.chain.balance(&self.token.address, &payee)
    }

    pub fn has_record(&self, service_id: &str) -> bool {
        self.memory
            .contains(&SubscriptionStore::storage_key(service_id))
    }
}

pub fn build_engine(
    clock: &Arc<ManualClock>,
    chain: &Arc<SimulatedChain>,
    memory: &Arc<MemoryStore>,
    cache: &Arc<BalanceCache>,
) -> Arc<SubscriptionEngine> {
    Arc::new(
        SubscriptionEngine::new(
            Catalog::demo(),
            BillingPolicy::default(),
            chain.clone(),
            SubscriptionStore::new(memory.clone()),
            cache.clone(),
        )
        .with_clock(clock.clone()),
    )
}

/// Whole token units to minor units.
pub fn units(whole: i64) -> u128 {
    Token::alpha_usd()
        .to_units(&Amount::from_units(whole))
        .unwrap()
}
