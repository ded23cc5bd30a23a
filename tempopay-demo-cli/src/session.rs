//! Wallet session shared by every command.
//!
//! The storage directory holds the root key (`identity.json`), the simulated
//! chain (`chain.json`) and one JSON file per persisted subscription under
//! `store/`.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempopay_lib::testnet::{LocalRootAccount, SimulatedChain};
use tempopay_lib::{Amount, SystemClock, Token};
use tempopay_subscriptions::{
    BalanceCache, BillingPolicy, Catalog, FileStore, SubscriptionEngine, SubscriptionStore,
};

pub fn identity_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join("identity.json")
}

pub fn chain_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join("chain.json")
}

/// Load the root account, failing with a hint when none exists.
pub fn load_identity(storage_dir: &Path) -> Result<LocalRootAccount> {
    let path = identity_path(storage_dir);
    if !path.exists() {
        return Err(anyhow!(
            "No wallet configured. Run 'tempopay-demo init' first."
        ));
    }
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}

pub fn save_identity(storage_dir: &Path, account: &LocalRootAccount) -> Result<()> {
    std::fs::create_dir_all(storage_dir)?;
    let json = serde_json::to_string_pretty(account)?;
    std::fs::write(identity_path(storage_dir), json)?;
    Ok(())
}

/// An open wallet with its subscriptions restored.
pub struct Session {
    storage_dir: PathBuf,
    pub root: Arc<LocalRootAccount>,
    pub chain: Arc<SimulatedChain>,
    pub cache: Arc<BalanceCache>,
    pub engine: Arc<SubscriptionEngine>,
    pub token: Token,
    pub restored: usize,
}

impl Session {
    pub async fn open(storage_dir: &Path) -> Result<Self> {
        let root = Arc::new(load_identity(storage_dir)?);
        let chain = SimulatedChain::load(&chain_path(storage_dir), Arc::new(SystemClock))
            .context("loading chain snapshot")?;

        let policy = BillingPolicy::from_env();
        let token = policy.token;
        let cache = Arc::new(BalanceCache::default());
        cache.refresh_from(chain.as_ref(), &token, &root.address()).await?;

        let store = FileStore::new(storage_dir.join("store"))?;
        let engine = Arc::new(SubscriptionEngine::new(
            Catalog::demo(),
            policy,
            chain.clone(),
            SubscriptionStore::new(Arc::new(store)),
            cache.clone(),
        ));
        let restored = engine.attach_account(root.clone()).await?;
        tracing::debug!(restored, "session opened");

        Ok(Self {
            storage_dir: storage_dir.to_path_buf(),
            root,
            chain,
            cache,
            engine,
            token,
            restored,
        })
    }

    /// Current balance, read straight from the chain.
    pub async fn balance(&self) -> Result<Amount> {
        Ok(self
            .cache
            .refresh_from(self.chain.as_ref(), &self.token, &self.root.address())
            .await?)
    }

    /// Persist the chain so the next command sees this one's transactions.
    pub fn close(self) -> Result<()> {
        self.engine.detach_account();
        self.chain.save(&chain_path(&self.storage_dir))?;
        Ok(())
    }
}
